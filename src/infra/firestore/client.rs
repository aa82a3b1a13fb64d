use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::StoreError;
use crate::fetch::auth::ApiKey;
use crate::fetch::{BasicClient, HttpClient, post_json};
use crate::infra::firestore::query::{Cursor, commit_body, pass_query};
use crate::infra::firestore::value::decode_value;
use crate::pass::RawPass;
use crate::services::document_store::{DocumentStore, DocumentWrite};
use crate::services::pass_store::{PassStore, QueryStrategy};

const PRODUCTION_BASE_URL: &str = "https://firestore.googleapis.com/v1";
/// Token the emulator accepts as an administrator credential.
const EMULATOR_TOKEN: &str = "owner";

#[derive(Deserialize)]
struct RunQueryResponse {
    document: Option<FirestoreDocument>,
}

#[derive(Deserialize)]
struct FirestoreDocument {
    name: String,
    #[serde(default)]
    fields: Map<String, Value>,
}

/// Where to reach Firestore and with which credential.
#[derive(Debug, Clone)]
pub struct FirestoreSettings {
    pub project_id: String,
    /// `host:port` of a local emulator; wins over the production endpoint.
    pub emulator_host: Option<String>,
    pub access_token: Option<String>,
    pub pass_collection: String,
    pub page_size: usize,
}

/// Firestore REST client serving as both pass store and document store.
pub struct FirestoreClient<C> {
    http: C,
    base_url: String,
    documents_root: String,
    pass_collection: String,
    page_size: usize,
}

impl FirestoreClient<ApiKey<BasicClient>> {
    pub fn connect(settings: FirestoreSettings) -> Result<Self, StoreError> {
        let (base_url, token) = match (&settings.emulator_host, &settings.access_token) {
            (Some(host), _) => (format!("http://{host}/v1"), EMULATOR_TOKEN.to_string()),
            (None, Some(token)) => (PRODUCTION_BASE_URL.to_string(), token.clone()),
            (None, None) => {
                return Err(StoreError::Unavailable(
                    "no access token and no emulator host configured".to_string(),
                ));
            }
        };

        let http = ApiKey::bearer(BasicClient::new()?, &token)?;
        Ok(Self::with_client(http, base_url, settings))
    }
}

impl<C: HttpClient> FirestoreClient<C> {
    pub fn with_client(http: C, base_url: String, settings: FirestoreSettings) -> Self {
        Self {
            http,
            base_url,
            documents_root: format!(
                "projects/{}/databases/(default)/documents",
                settings.project_id
            ),
            pass_collection: settings.pass_collection,
            page_size: settings.page_size.max(1),
        }
    }

    fn url(&self, method: &str) -> String {
        format!("{}/{}:{}", self.base_url, self.documents_root, method)
    }
}

/// Turns a stored document into a pass. Fields are checked one at a time,
/// so a field of the wrong type is dropped and the rest of the pass survives.
fn pass_from_document(doc: &FirestoreDocument) -> RawPass {
    let mut usable = Map::new();
    for (name, value) in &doc.fields {
        let decoded = decode_value(value);
        let single = Value::Object(Map::from_iter([(name.clone(), decoded.clone())]));
        match serde_json::from_value::<RawPass>(single) {
            Ok(_) => {
                usable.insert(name.clone(), decoded);
            }
            Err(e) => {
                debug!(
                    document = %doc.name,
                    field = %name,
                    error = %e,
                    "Dropping mistyped pass field"
                );
            }
        }
    }
    serde_json::from_value(Value::Object(usable)).unwrap_or_default()
}

#[async_trait]
impl<C: HttpClient> PassStore for FirestoreClient<C> {
    async fn query(
        &self,
        city_id: &str,
        strategy: QueryStrategy,
        cutoff_ms: f64,
    ) -> Result<Vec<RawPass>, StoreError> {
        let url = self.url("runQuery");
        let mut passes = Vec::new();
        let mut cursor: Option<Cursor> = None;

        loop {
            let body = pass_query(
                &self.pass_collection,
                city_id,
                strategy,
                cutoff_ms,
                self.page_size,
                cursor.as_ref(),
            );
            let page: Vec<RunQueryResponse> = post_json(&self.http, &url, &body).await?;
            let documents: Vec<FirestoreDocument> =
                page.into_iter().filter_map(|r| r.document).collect();

            debug!(%strategy, page = documents.len(), "Fetched pass page");
            passes.extend(documents.iter().map(pass_from_document));

            match documents.last() {
                Some(last) if documents.len() >= self.page_size => {
                    cursor = Some(Cursor {
                        name: last.name.clone(),
                        event_time: last.fields.get("eventTimeMs").cloned(),
                    });
                }
                _ => break,
            }
        }

        Ok(passes)
    }
}

#[async_trait]
impl<C: HttpClient> DocumentStore for FirestoreClient<C> {
    async fn commit(&self, writes: &[DocumentWrite]) -> Result<(), StoreError> {
        if writes.is_empty() {
            return Ok(());
        }
        let body = commit_body(&self.documents_root, writes)?;
        let _: Value = post_json(&self.http, &self.url("commit"), &body).await?;
        Ok(())
    }
}
