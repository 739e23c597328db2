use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, error};
use uuid::Uuid;

use crate::error::GatewayError;
use crate::gateway::{DocumentGateway, GatewayResult};
use crate::models::{
    Collaborator, Document, DocumentChanges, LabelEntry, NewCollaborator, NewDocument,
};
use crate::params::QueryParams;

const DOCUMENTS_TABLE: &str = "documents";
const COLLABORATORS_TABLE: &str = "document_collaborators";
const COMMENTS_TABLE: &str = "comments";
const TAGS_TABLE: &str = "tags";
const CATEGORIES_TABLE: &str = "categories";

const DETAIL_SELECT: &str = "*,user:users(id,name,avatar_url)";

/// REST binding for the remote document catalog, speaking
/// PostgREST-style conventions: `order=field.dir`, offset/limit from
/// the range window, `Prefer` headers steering representation, and
/// exact counts read back from `Content-Range`.
pub struct RestGateway {
    client: Client,
    base_url: String,
    api_key: String,
    access_token: Option<String>,
}

impl RestGateway {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            access_token: None,
        }
    }

    /// Attaches the session's bearer token; without one the api key is
    /// sent as the bearer as well.
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    fn endpoint(&self, table: &str) -> String {
        format!("{}/rest/v1/{table}", self.base_url)
    }

    fn auth_headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Ok(value) = HeaderValue::from_str(&self.api_key) {
            headers.insert("apikey", value);
        }
        let bearer = self.access_token.as_deref().unwrap_or(&self.api_key);
        if let Ok(value) = HeaderValue::from_str(&format!("Bearer {bearer}")) {
            headers.insert(AUTHORIZATION, value);
        }
        headers
    }

    fn get(&self, table: &str) -> RequestBuilder {
        self.client.get(self.endpoint(table)).headers(self.auth_headers())
    }

    async fn load_rows<T: DeserializeOwned>(&self, request: RequestBuilder) -> GatewayResult<T> {
        let response = request.send().await?;
        let response = expect_success(response).await?;
        Ok(response.json::<T>().await?)
    }

    /// Exact row count without fetching rows: a zero-width ranged read
    /// with `Prefer: count=exact`, answered through `Content-Range`.
    async fn count_rows(&self, table: &str, query: &[(String, String)]) -> GatewayResult<u64> {
        let response = self
            .get(table)
            .header("Prefer", "count=exact")
            .header("Range", "0-0")
            .query(&[("select", "id")])
            .query(query)
            .send()
            .await?;
        let response = expect_success(response).await?;
        parse_content_range_total(&response)
    }

    async fn user_documents(&self, query: Vec<(String, String)>) -> GatewayResult<Vec<Document>> {
        let request = self
            .get(DOCUMENTS_TABLE)
            .query(&[
                ("select", DETAIL_SELECT),
                ("order", "created_at.desc"),
            ])
            .query(&query);
        self.load_rows(request).await
    }
}

#[async_trait]
impl DocumentGateway for RestGateway {
    async fn select_documents(&self, params: &QueryParams) -> GatewayResult<Vec<Document>> {
        let order = format!(
            "{}.{}",
            params.order.field,
            params.order.direction.as_query_str()
        );
        let offset = params.range.from.to_string();
        let limit = params.range.width().to_string();

        let mut query: Vec<(String, String)> = vec![
            ("select".to_string(), DETAIL_SELECT.to_string()),
            ("order".to_string(), order),
            ("offset".to_string(), offset),
            ("limit".to_string(), limit),
        ];
        if let Some(filters) = params.filters.as_ref() {
            append_filter_conditions(&mut query, filters);
        }

        debug!(
            from = params.range.from,
            to = params.range.to,
            "selecting document page"
        );
        self.load_rows(self.get(DOCUMENTS_TABLE).query(&query)).await
    }

    async fn count_public_documents(&self) -> GatewayResult<u64> {
        let query = vec![
            ("is_public".to_string(), "is.true".to_string()),
            ("is_draft".to_string(), "is.false".to_string()),
        ];
        self.count_rows(DOCUMENTS_TABLE, &query).await
    }

    async fn fetch_mine(&self, user_id: Uuid) -> GatewayResult<Vec<Document>> {
        self.user_documents(vec![("user_id".to_string(), format!("eq.{user_id}"))])
            .await
    }

    async fn fetch_private(&self, user_id: Uuid) -> GatewayResult<Vec<Document>> {
        self.user_documents(vec![
            ("user_id".to_string(), format!("eq.{user_id}")),
            ("is_public".to_string(), "is.false".to_string()),
        ])
        .await
    }

    async fn fetch_drafts(&self, user_id: Uuid) -> GatewayResult<Vec<Document>> {
        self.user_documents(vec![
            ("user_id".to_string(), format!("eq.{user_id}")),
            ("is_draft".to_string(), "is.true".to_string()),
        ])
        .await
    }

    async fn fetch_shared_with_me(&self, user_id: Uuid) -> GatewayResult<Vec<Document>> {
        #[derive(Deserialize)]
        struct SharedRow {
            document: Option<Document>,
        }

        let select = format!("document:documents({DETAIL_SELECT})");
        let user_filter = format!("eq.{user_id}");
        let request = self
            .get(COLLABORATORS_TABLE)
            .query(&[("select", select.as_str()), ("user_id", user_filter.as_str())]);
        let rows: Vec<SharedRow> = self.load_rows(request).await?;
        Ok(rows.into_iter().filter_map(|row| row.document).collect())
    }

    async fn fetch_document_detail(&self, id: Uuid) -> GatewayResult<Option<Document>> {
        let id_filter = format!("eq.{id}");
        let request = self
            .get(DOCUMENTS_TABLE)
            .query(&[("select", DETAIL_SELECT), ("id", id_filter.as_str())]);
        let mut rows: Vec<Document> = self.load_rows(request).await?;
        let Some(mut document) = rows.pop() else {
            return Ok(None);
        };

        let comment_query = vec![("document_id".to_string(), format!("eq.{id}"))];
        document.comment_count = Some(self.count_rows(COMMENTS_TABLE, &comment_query).await? as i64);
        Ok(Some(document))
    }

    async fn fetch_collaborators(&self, document_id: Uuid) -> GatewayResult<Vec<Collaborator>> {
        #[derive(Deserialize)]
        struct CollaboratorRow {
            user: Option<Collaborator>,
        }

        let document_filter = format!("eq.{document_id}");
        let request = self.get(COLLABORATORS_TABLE).query(&[
            ("select", "user:users(id,name,email,phone,avatar_url)"),
            ("document_id", document_filter.as_str()),
        ]);
        let rows: Vec<CollaboratorRow> = self.load_rows(request).await?;
        Ok(rows.into_iter().filter_map(|row| row.user).collect())
    }

    async fn insert_document(&self, row: &NewDocument) -> GatewayResult<Document> {
        let response = self
            .client
            .post(self.endpoint(DOCUMENTS_TABLE))
            .headers(self.auth_headers())
            .header("Prefer", "return=representation")
            .json(&[row])
            .send()
            .await?;
        let response = expect_success(response).await?;
        let mut rows: Vec<Document> = response.json().await?;
        rows.pop()
            .ok_or_else(|| GatewayError::new("insert returned no rows"))
    }

    async fn update_document(
        &self,
        id: Uuid,
        changes: &DocumentChanges,
    ) -> GatewayResult<StatusCode> {
        let response = self
            .client
            .patch(self.endpoint(DOCUMENTS_TABLE))
            .headers(self.auth_headers())
            .header("Prefer", "return=minimal")
            .query(&[("id", format!("eq.{id}"))])
            .json(changes)
            .send()
            .await?;
        Ok(response.status())
    }

    async fn delete_document(&self, id: Uuid) -> GatewayResult<StatusCode> {
        let response = self
            .client
            .delete(self.endpoint(DOCUMENTS_TABLE))
            .headers(self.auth_headers())
            .header("Prefer", "return=minimal")
            .query(&[("id", format!("eq.{id}"))])
            .send()
            .await?;
        Ok(response.status())
    }

    async fn delete_collaborators(&self, document_id: Uuid) -> GatewayResult<()> {
        let response = self
            .client
            .delete(self.endpoint(COLLABORATORS_TABLE))
            .headers(self.auth_headers())
            .header("Prefer", "return=minimal")
            .query(&[("document_id", format!("eq.{document_id}"))])
            .send()
            .await?;
        expect_success(response).await?;
        Ok(())
    }

    async fn insert_collaborators(&self, rows: &[NewCollaborator]) -> GatewayResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        let response = self
            .client
            .post(self.endpoint(COLLABORATORS_TABLE))
            .headers(self.auth_headers())
            .header("Prefer", "return=minimal")
            .json(rows)
            .send()
            .await?;
        expect_success(response).await?;
        Ok(())
    }

    async fn list_tags(&self) -> GatewayResult<Vec<LabelEntry>> {
        let request = self
            .get(TAGS_TABLE)
            .query(&[("select", "slug,name"), ("order", "name.asc")]);
        self.load_rows(request).await
    }

    async fn list_categories(&self) -> GatewayResult<Vec<LabelEntry>> {
        let request = self
            .get(CATEGORIES_TABLE)
            .query(&[("select", "slug,name"), ("order", "name.asc")]);
        self.load_rows(request).await
    }
}

fn append_filter_conditions(
    query: &mut Vec<(String, String)>,
    filters: &crate::params::DocumentFilters,
) {
    if !filters.tags.is_empty() {
        query.push((
            "tags".to_string(),
            format!("cs.{{{}}}", filters.tags.join(",")),
        ));
    }
    if let Some(category) = filters.category.as_deref() {
        query.push(("category".to_string(), format!("eq.{category}")));
    }
    if let Some(search) = filters.search.as_deref() {
        let sanitized: String = search
            .chars()
            .filter(|ch| !matches!(ch, ',' | '(' | ')' | '*'))
            .collect();
        if !sanitized.trim().is_empty() {
            query.push(("name".to_string(), format!("ilike.*{}*", sanitized.trim())));
        }
    }
    if let Some(is_draft) = filters.is_draft {
        query.push(("is_draft".to_string(), format!("is.{is_draft}")));
    }
    if let Some(is_public) = filters.is_public {
        query.push(("is_public".to_string(), format!("is.{is_public}")));
    }
}

async fn expect_success(response: Response) -> GatewayResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    error!(%status, body = %body, "gateway request failed");
    Err(GatewayError::with_status(
        format!("gateway returned {status}: {body}"),
        status,
    ))
}

/// `Content-Range` arrives as `0-0/25` (or `*/0` for an empty table);
/// the total sits after the slash.
fn parse_content_range_total(response: &Response) -> GatewayResult<u64> {
    let header = response
        .headers()
        .get("content-range")
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| GatewayError::new("count response missing content-range header"))?;

    let total = header
        .rsplit('/')
        .next()
        .ok_or_else(|| GatewayError::new("malformed content-range header"))?;

    if total == "*" {
        return Ok(0);
    }

    total
        .parse::<u64>()
        .map_err(|_| GatewayError::new(format!("malformed content-range total '{header}'")))
}
