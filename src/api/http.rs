use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, Url};
use serde::{Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::{debug, error};

use crate::{
    MailflowError, Result,
    api::{CompanyScope, WorkflowApi},
    model::{ActionModel, ApiResponse, CreatedAction, Items, NewAction, NewWorkflow, UpdateAction, UpdateWorkflow, WorkflowModel},
};

/// [`WorkflowApi`] over the backend's REST interface.
///
/// Every request carries the access token as a bearer header and sends or
/// expects JSON. Build one with [`crate::ClientBuilder`].
#[derive(Clone)]
pub struct HttpWorkflowApi {
    client: reqwest::Client,
    base_url: Url,
    token: String,
}

impl HttpWorkflowApi {
    pub(crate) fn new(
        client: reqwest::Client,
        base_url: &str,
        token: String,
    ) -> Result<Self> {
        let base_url = Url::parse(base_url.trim()).map_err(|e| MailflowError::Config(format!("invalid base url '{}': {}", base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(MailflowError::Config(format!("base url '{}' cannot take a path", base_url)));
        }
        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    /// The scope encoded in this client's access token.
    pub fn token_scope(&self) -> CompanyScope {
        CompanyScope::from_token(&self.token)
    }

    /// `{base}/{company}/{segments..}`, each segment percent-encoded.
    fn url(
        &self,
        scope: &CompanyScope,
        segments: &[&str],
    ) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push(scope.company_id()).extend(segments);
        }
        url
    }

    fn request(
        &self,
        method: Method,
        scope: &CompanyScope,
        segments: &[&str],
    ) -> RequestBuilder {
        let url = self.url(scope, segments);
        debug!("{} {}", method, url);
        self.client.request(method, url).bearer_auth(&self.token)
    }

    async fn send(request: RequestBuilder) -> Result<Response> {
        let response = request.send().await.map_err(|e| {
            error!("request failed: {}", e);
            MailflowError::from(e)
        })?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        error!("backend answered {}: {}", status, body);
        Err(MailflowError::Api {
            status: status.as_u16(),
            body,
        })
    }

    async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T> {
        let response = Self::send(request).await?;
        let envelope = response.json::<ApiResponse<T>>().await.map_err(|e| MailflowError::Convert(format!("unexpected response body: {}", e)))?;
        Ok(envelope.data)
    }

    fn with_body<B: Serialize + ?Sized>(
        request: RequestBuilder,
        body: &B,
    ) -> RequestBuilder {
        request.json(body)
    }
}

#[async_trait]
impl WorkflowApi for HttpWorkflowApi {
    async fn create_workflow(
        &self,
        scope: &CompanyScope,
        workflow: &NewWorkflow,
    ) -> Result<String> {
        let request = Self::with_body(self.request(Method::POST, scope, &["workflow"]), workflow);
        Self::send_json::<String>(request).await
    }

    async fn list_workflows(
        &self,
        scope: &CompanyScope,
        page: u32,
        limit: u32,
    ) -> Result<Vec<WorkflowModel>> {
        let request = self.request(Method::GET, scope, &["workflow"]).query(&[("page", page), ("limit", limit)]);
        Ok(Self::send_json::<Items<WorkflowModel>>(request).await?.items)
    }

    async fn update_workflow(
        &self,
        scope: &CompanyScope,
        workflow_id: &str,
        update: &UpdateWorkflow,
    ) -> Result<()> {
        let request = Self::with_body(self.request(Method::PUT, scope, &["workflow", workflow_id]), update);
        Self::send(request).await.map(|_| ())
    }

    async fn delete_workflow(
        &self,
        scope: &CompanyScope,
        workflow_id: &str,
    ) -> Result<()> {
        let request = self.request(Method::DELETE, scope, &["workflow", workflow_id]);
        Self::send(request).await.map(|_| ())
    }

    async fn list_actions(
        &self,
        scope: &CompanyScope,
        workflow_id: &str,
    ) -> Result<Vec<ActionModel>> {
        let request = self.request(Method::GET, scope, &["workflow", workflow_id, "action"]);
        Ok(Self::send_json::<Items<ActionModel>>(request).await?.items)
    }

    async fn create_action(
        &self,
        scope: &CompanyScope,
        workflow_id: &str,
        action: &NewAction,
    ) -> Result<CreatedAction> {
        let request = Self::with_body(self.request(Method::POST, scope, &["workflow", workflow_id, "action"]), action);
        Self::send_json::<CreatedAction>(request).await
    }

    async fn update_action(
        &self,
        scope: &CompanyScope,
        workflow_id: &str,
        action_id: &str,
        update: &UpdateAction,
    ) -> Result<()> {
        let request = Self::with_body(self.request(Method::PUT, scope, &["workflow", workflow_id, "action", action_id]), update);
        Self::send(request).await.map(|_| ())
    }

    async fn start_workflow(
        &self,
        scope: &CompanyScope,
        workflow_id: &str,
    ) -> Result<()> {
        let request = Self::with_body(self.request(Method::POST, scope, &["workflow", workflow_id, "start"]), &serde_json::json!({}));
        Self::send(request).await.map(|_| ())
    }

    async fn list_campaigns(
        &self,
        scope: &CompanyScope,
    ) -> Result<Vec<Value>> {
        let request = self.request(Method::GET, scope, &["campaigns", "all"]);
        let data = Self::send_json::<Value>(request).await?;
        // the campaign endpoint answers either a bare array or an items page
        match data {
            Value::Array(items) => Ok(items),
            Value::Object(mut map) => match map.remove("items") {
                Some(Value::Array(items)) => Ok(items),
                _ => Err(MailflowError::Convert("campaign page has no items list".to_string())),
            },
            other => Err(MailflowError::Convert(format!("unexpected campaign list: {}", other))),
        }
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{body_json, header, method, path, query_param},
    };

    use super::*;
    use crate::{ClientBuilder, workflow::ActionKind};

    const TOKEN: &str = "test-token";

    async fn api(server: &MockServer) -> HttpWorkflowApi {
        ClientBuilder::new().base_url(format!("{}/api", server.uri())).token(TOKEN).build().unwrap()
    }

    fn scope() -> CompanyScope {
        CompanyScope::new("c1")
    }

    #[tokio::test]
    async fn test_list_actions() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/c1/workflow/w1/action"))
            .and(header("authorization", "Bearer test-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {"items": [
                    {"id": "1", "type": "condition", "parent_id": "00000000-0000-0000-0000-000000000000", "data": ""},
                    {"id": "2", "type": "email", "parent_id": "1", "data": "{\"branch\":\"yes\"}"}
                ]}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let actions = api(&server).await.list_actions(&scope(), "w1").await.unwrap();
        assert_eq!(actions.len(), 2);
        assert_eq!(actions[1].kind, ActionKind::Email);
    }

    #[tokio::test]
    async fn test_create_action_sends_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/c1/workflow/w1/action"))
            .and(body_json(json!({"type": "wait", "title": "Wait", "parent_id": "1", "data": "{\"branch\":\"no\"}"})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"data": {"ID": "9", "parent_id": "1"}})))
            .mount(&server)
            .await;

        let created = api(&server)
            .await
            .create_action(
                &scope(),
                "w1",
                &NewAction {
                    kind: ActionKind::Wait,
                    title: "Wait".into(),
                    parent_id: "1".into(),
                    data: Some("{\"branch\":\"no\"}".into()),
                },
            )
            .await
            .unwrap();
        assert_eq!(created.id, "9");
        assert_eq!(created.parent_id.as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn test_update_action_path_and_body() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/api/c1/workflow/w1/action/9"))
            .and(body_json(json!({"type": "wait", "data": "{\"duration\":\"5d\"}"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": null})))
            .expect(1)
            .mount(&server)
            .await;

        api(&server)
            .await
            .update_action(
                &scope(),
                "w1",
                "9",
                &UpdateAction {
                    kind: ActionKind::Wait,
                    data: "{\"duration\":\"5d\"}".into(),
                },
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_list_workflows_paging() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/c1/workflow"))
            .and(query_param("page", "2"))
            .and(query_param("limit", "5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"items": [{"id": "w1", "name": "Onboarding", "status": "draft"}]}})))
            .mount(&server)
            .await;

        let workflows = api(&server).await.list_workflows(&scope(), 2, 5).await.unwrap();
        assert_eq!(workflows.len(), 1);
        assert_eq!(workflows[0].name, "Onboarding");
    }

    #[tokio::test]
    async fn test_create_workflow_returns_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/c1/workflow"))
            .and(body_json(json!({"name": "Onboarding", "mailinglist_id": "ml-1", "trigger": "welcome", "trigger_data": {}})))
            .respond_with(ResponseTemplate::new(201).set_body_json(json!({"data": "w42"})))
            .mount(&server)
            .await;

        let id = api(&server).await.create_workflow(&scope(), &NewWorkflow::welcome("Onboarding", "ml-1").unwrap()).await.unwrap();
        assert_eq!(id, "w42");
    }

    #[tokio::test]
    async fn test_start_and_delete() {
        let server = MockServer::start().await;
        Mock::given(method("POST")).and(path("/api/c1/workflow/w1/start")).respond_with(ResponseTemplate::new(200)).expect(1).mount(&server).await;
        Mock::given(method("DELETE")).and(path("/api/c1/workflow/w1")).respond_with(ResponseTemplate::new(204)).expect(1).mount(&server).await;

        let api = api(&server).await;
        api.start_workflow(&scope(), "w1").await.unwrap();
        api.delete_workflow(&scope(), "w1").await.unwrap();
    }

    #[tokio::test]
    async fn test_error_status_becomes_api_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/c1/workflow/w1/start"))
            .respond_with(ResponseTemplate::new(422).set_body_string("workflow has no actions"))
            .mount(&server)
            .await;

        let err = api(&server).await.start_workflow(&scope(), "w1").await.unwrap_err();
        assert_eq!(
            err,
            MailflowError::Api {
                status: 422,
                body: "workflow has no actions".into()
            }
        );
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_unexpected_body_is_convert_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/c1/workflow/w1/action"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let err = api(&server).await.list_actions(&scope(), "w1").await.unwrap_err();
        assert!(matches!(err, MailflowError::Convert(_)));
    }

    #[tokio::test]
    async fn test_list_campaigns_accepts_items_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/c1/campaigns/all"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"items": [{"id": "cmp1"}]}})))
            .mount(&server)
            .await;

        let campaigns = api(&server).await.list_campaigns(&scope()).await.unwrap();
        assert_eq!(campaigns, vec![json!({"id": "cmp1"})]);
    }

    #[tokio::test]
    async fn test_list_campaigns_rejects_unexpected_shape() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/c1/campaigns/all"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": "none"})))
            .mount(&server)
            .await;

        let err = api(&server).await.list_campaigns(&scope()).await.unwrap_err();
        assert!(matches!(err, MailflowError::Convert(_)));
    }

    #[test]
    fn test_url_trailing_slash() {
        let api = HttpWorkflowApi::new(reqwest::Client::new(), "http://localhost:8080/api/", TOKEN.into()).unwrap();
        assert_eq!(api.url(&scope(), &["workflow"]).as_str(), "http://localhost:8080/api/c1/workflow");
    }

    #[test]
    fn test_url_escapes_ids() {
        let api = HttpWorkflowApi::new(reqwest::Client::new(), "http://localhost:8080/api", TOKEN.into()).unwrap();
        let url = api.url(&CompanyScope::new("c1/../c2"), &["workflow", "w1?x=1#frag", "action"]);
        assert_eq!(url.as_str(), "http://localhost:8080/api/c1%2F..%2Fc2/workflow/w1%3Fx=1%23frag/action");
        assert_eq!(url.query(), None);
        assert_eq!(url.fragment(), None);
    }

    #[test]
    fn test_rejects_unusable_base_url() {
        assert!(HttpWorkflowApi::new(reqwest::Client::new(), "not a url", TOKEN.into()).is_err());
        assert!(HttpWorkflowApi::new(reqwest::Client::new(), "mailto:ops@example.com", TOKEN.into()).is_err());
    }
}
