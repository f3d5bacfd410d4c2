use std::sync::Arc;

use futures::{StreamExt, future::BoxFuture};
use indexmap::IndexMap;
use reqwest::{Client, Method, header::ACCEPT};
use serde_json::{Map, Value};
use tracing::debug;

use crate::dao::{
    storage::{StorageError, StorageResult},
    tree_store::{TreePath, TreeStore, TreeStream},
};

use super::{
    config::FirebaseConfig,
    error::{FirebaseDaoError, FirebaseResult},
    events::{FrameDecoder, Mirror, MirrorUpdate},
};

/// [`TreeStore`] backed by the Firebase Realtime Database REST API.
#[derive(Clone)]
pub struct FirebaseTreeStore {
    client: Client,
    base_url: Arc<str>,
    auth: Option<Arc<str>>,
}

impl FirebaseTreeStore {
    /// Build the HTTP client and make sure the database answers.
    pub async fn connect(config: FirebaseConfig) -> FirebaseResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|source| FirebaseDaoError::ClientBuilder { source })?;

        let store = Self {
            client,
            base_url: Arc::<str>::from(config.database_url.trim_end_matches('/')),
            auth: config.auth.map(Arc::<str>::from),
        };

        store.ping().await?;
        Ok(store)
    }

    fn url(&self, path: &TreePath) -> String {
        format!("{}/{}.json", self.base_url, path)
    }

    fn request(&self, method: Method, path: &TreePath) -> reqwest::RequestBuilder {
        let builder = self.client.request(method, self.url(path));
        match self.auth {
            Some(ref auth) => builder.query(&[("auth", auth.as_ref())]),
            None => builder,
        }
    }

    async fn ping(&self) -> FirebaseResult<()> {
        let root = TreePath::root();
        let response = self
            .request(Method::GET, &root)
            .query(&[("shallow", "true")])
            .send()
            .await
            .map_err(|source| FirebaseDaoError::RequestSend {
                path: root.to_string(),
                source,
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(FirebaseDaoError::RequestStatus {
                path: root.to_string(),
                status: response.status(),
            })
        }
    }

    async fn write(&self, method: Method, path: &TreePath, body: &Value) -> FirebaseResult<()> {
        let response = self
            .request(method, path)
            .query(&[("print", "silent")])
            .json(body)
            .send()
            .await
            .map_err(|source| FirebaseDaoError::RequestSend {
                path: path.to_string(),
                source,
            })?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(FirebaseDaoError::RequestStatus {
                path: path.to_string(),
                status: response.status(),
            })
        }
    }

    async fn open_event_stream(&self, path: &TreePath) -> FirebaseResult<reqwest::Response> {
        let response = self
            .request(Method::GET, path)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|source| FirebaseDaoError::RequestSend {
                path: path.to_string(),
                source,
            })?;

        if response.status().is_success() {
            Ok(response)
        } else {
            Err(FirebaseDaoError::RequestStatus {
                path: path.to_string(),
                status: response.status(),
            })
        }
    }
}

impl TreeStore for FirebaseTreeStore {
    fn subscribe(&self, path: &TreePath) -> TreeStream {
        let store = self.clone();
        let path = path.clone();
        Box::pin(async_stream::stream! {
            let response = match store.open_event_stream(&path).await {
                Ok(response) => response,
                Err(err) => {
                    yield Err(StorageError::from(err));
                    return;
                }
            };
            debug!(%path, "Firebase event stream opened");

            let mut body = response.bytes_stream();
            let mut decoder = FrameDecoder::default();
            let mut mirror = Mirror::default();

            while let Some(chunk) = body.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(source) => {
                        yield Err(StorageError::from(FirebaseDaoError::RequestSend { path: path.to_string(), source }));
                        return;
                    }
                };

                for frame in decoder.push(&chunk) {
                    match mirror.apply(&frame) {
                        Ok(MirrorUpdate::Changed(value)) => yield Ok(value),
                        Ok(MirrorUpdate::Unchanged) => {}
                        Ok(MirrorUpdate::Cancelled(reason)) => {
                            yield Err(StorageError::from(FirebaseDaoError::SubscriptionCancelled { path: path.to_string(), reason }));
                            return;
                        }
                        Err(source) => {
                            yield Err(StorageError::from(FirebaseDaoError::DecodeEvent { path: path.to_string(), source }));
                            return;
                        }
                    }
                }
            }

            yield Err(StorageError::SubscriptionClosed {
                path: path.to_string(),
                reason: "event stream ended".into(),
            });
        })
    }

    fn set_whole_tree(&self, path: &TreePath, value: Value) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        let path = path.clone();
        Box::pin(async move {
            store
                .write(Method::PUT, &path, &value)
                .await
                .map_err(Into::into)
        })
    }

    fn merge_update(
        &self,
        updates: IndexMap<TreePath, Value>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let body: Map<String, Value> = updates
                .into_iter()
                .map(|(path, value)| (path.to_string(), value))
                .collect();
            store
                .write(Method::PATCH, &TreePath::root(), &Value::Object(body))
                .await
                .map_err(Into::into)
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move { store.ping().await.map_err(Into::into) })
    }
}
