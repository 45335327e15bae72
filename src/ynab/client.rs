use crate::config::Config;
use crate::rate_limit::RateLimiter;
use crate::ynab::api_types::{
  ApiAccountsData, ApiBudgetsData, ApiCategoriesData, ApiErrorResponse, ApiPayeesData,
  ApiResponse, ApiSaveCategoryData, ApiSavePayeeData, ApiTransactionsData, SaveMonthCategory,
  SaveMonthCategoryRequest, SavePayee, SavePayeeRequest,
};
use crate::ynab::types::{
  Account, Budget, Category, CategoryDelta, Payee, PayeeDelta, Transaction,
};
use chrono::NaiveDate;
use color_eyre::{eyre::eyre, Result};
use reqwest::{Method, RequestBuilder};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Default HTTP request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// YNAB API client wrapper
#[derive(Clone)]
pub struct YnabClient {
  http: reqwest::Client,
  base_url: Url,
  token: String,
  limiter: Arc<RateLimiter>,
}

impl YnabClient {
  pub fn new(config: &Config, limiter: Arc<RateLimiter>) -> Result<Self> {
    let token = Config::get_api_token()?;

    // Url::join drops the last path segment unless it ends with '/'
    let mut base = config.ynab.url.clone();
    if !base.ends_with('/') {
      base.push('/');
    }
    let base_url =
      Url::parse(&base).map_err(|e| eyre!("Invalid API url {}: {}", config.ynab.url, e))?;

    let http = reqwest::Client::builder()
      .timeout(REQUEST_TIMEOUT)
      .user_agent(concat!("ynab-agent/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| eyre!("Failed to create HTTP client: {}", e))?;

    Ok(Self {
      http,
      base_url,
      token,
      limiter,
    })
  }

  /// List budgets visible to the token
  pub async fn list_budgets(&self) -> Result<Vec<Budget>> {
    let data: ApiBudgetsData = self.get("budgets", &[]).await?;
    Ok(data.budgets.into_iter().map(Budget::from).collect())
  }

  /// List payees, only those changed since `since` when given
  pub async fn list_payees(&self, budget_id: &str, since: Option<i64>) -> Result<PayeeDelta> {
    let path = format!("budgets/{}/payees", budget_id);
    let data: ApiPayeesData = self.get(&path, &knowledge_query(since)).await?;
    Ok(data.into())
  }

  /// List category groups with their categories, only changes since `since` when given
  pub async fn list_categories(
    &self,
    budget_id: &str,
    since: Option<i64>,
  ) -> Result<CategoryDelta> {
    let path = format!("budgets/{}/categories", budget_id);
    let data: ApiCategoriesData = self.get(&path, &knowledge_query(since)).await?;
    Ok(data.into())
  }

  pub async fn list_accounts(&self, budget_id: &str) -> Result<Vec<Account>> {
    let path = format!("budgets/{}/accounts", budget_id);
    let data: ApiAccountsData = self.get(&path, &[]).await?;
    Ok(data.accounts.into_iter().map(Account::from).collect())
  }

  /// List transactions, optionally only those dated on or after `since_date`
  pub async fn list_transactions(
    &self,
    budget_id: &str,
    since_date: Option<NaiveDate>,
  ) -> Result<Vec<Transaction>> {
    let path = format!("budgets/{}/transactions", budget_id);
    let query: Vec<(&str, String)> = since_date
      .map(|d| vec![("since_date", d.format("%Y-%m-%d").to_string())])
      .unwrap_or_default();
    let data: ApiTransactionsData = self.get(&path, &query).await?;
    Ok(data.transactions.into_iter().map(Transaction::from).collect())
  }

  /// Rename a payee
  pub async fn rename_payee(&self, budget_id: &str, payee_id: &str, name: &str) -> Result<Payee> {
    let path = format!("budgets/{}/payees/{}", budget_id, payee_id);
    let body = SavePayeeRequest {
      payee: SavePayee { name },
    };

    let data: ApiSavePayeeData = self
      .send(self.request(Method::PATCH, &path)?.json(&body))
      .await
      .map_err(|e| eyre!("Failed to rename payee {}: {}", payee_id, e))?;

    Ok(data.payee.into())
  }

  /// Set the amount assigned to a category for a month (first day of month)
  pub async fn set_category_budgeted(
    &self,
    budget_id: &str,
    month: NaiveDate,
    category_id: &str,
    budgeted: i64,
  ) -> Result<Category> {
    let path = format!(
      "budgets/{}/months/{}/categories/{}",
      budget_id,
      month.format("%Y-%m-01"),
      category_id
    );
    let body = SaveMonthCategoryRequest {
      category: SaveMonthCategory { budgeted },
    };

    let data: ApiSaveCategoryData = self
      .send(self.request(Method::PATCH, &path)?.json(&body))
      .await
      .map_err(|e| eyre!("Failed to update category {}: {}", category_id, e))?;

    Ok(data.category.into())
  }

  async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T> {
    let request = self.request(Method::GET, path)?.query(query);
    self
      .send(request)
      .await
      .map_err(|e| eyre!("Failed to get {}: {}", path, e))
  }

  fn request(&self, method: Method, path: &str) -> Result<RequestBuilder> {
    let url = self
      .base_url
      .join(path)
      .map_err(|e| eyre!("Invalid API path {}: {}", path, e))?;

    Ok(self.http.request(method, url).bearer_auth(&self.token))
  }

  /// Send a request and unwrap the `data` envelope, turning API errors into messages
  async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
    self.limiter.acquire()?;

    let response = request.send().await.map_err(|e| eyre!("{}", e))?;
    let status = response.status();
    debug!("{} {}", status, response.url());

    let bytes = response.bytes().await.map_err(|e| eyre!("{}", e))?;

    if !status.is_success() {
      return Err(match serde_json::from_slice::<ApiErrorResponse>(&bytes) {
        Ok(body) => eyre!(
          "{} {} ({}): {}",
          status.as_u16(),
          body.error.name,
          body.error.id,
          body.error.detail
        ),
        Err(_) => eyre!("HTTP {}", status),
      });
    }

    let body: ApiResponse<T> =
      serde_json::from_slice(&bytes).map_err(|e| eyre!("Unexpected response: {}", e))?;
    Ok(body.data)
  }
}

fn knowledge_query(since: Option<i64>) -> Vec<(&'static str, String)> {
  since
    .map(|k| vec![("last_knowledge_of_server", k.to_string())])
    .unwrap_or_default()
}
