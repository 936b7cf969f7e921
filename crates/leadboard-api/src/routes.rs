use axum::{
    Router, middleware,
    routing::{get, patch, post},
};

use crate::middleware::require_auth;
use crate::state::AppState;
use crate::{boards, columns, leads, webhook};

/// Every HTTP route of the service. CORS and request tracing are layered on
/// by the binary.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(health))
        .route("/api/webhook/{token}", post(webhook::receive_lead))
        .with_state(state.clone());

    let protected_routes = Router::new()
        .route("/boards", get(boards::list_boards).post(boards::create_board))
        .route(
            "/boards/{board_id}",
            get(boards::get_board)
                .patch(boards::update_board)
                .delete(boards::delete_board),
        )
        .route("/boards/{board_id}/webhook", get(boards::webhook_info))
        .route("/boards/{board_id}/events", get(boards::board_events))
        .route(
            "/boards/{board_id}/columns",
            get(columns::list_columns).post(columns::create_column),
        )
        .route(
            "/columns/{column_id}",
            patch(columns::update_column).delete(columns::delete_column),
        )
        .route("/boards/{board_id}/leads", get(leads::list_leads))
        .route("/columns/{column_id}/leads", post(leads::create_lead))
        .route(
            "/leads/{lead_id}",
            patch(leads::update_lead).delete(leads::delete_lead),
        )
        .route("/leads/{lead_id}/move", post(leads::move_lead))
        .layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .with_state(state);

    Router::new().merge(public_routes).merge(protected_routes)
}

async fn health() -> &'static str {
    "ok"
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        http::{Method, Request, StatusCode, header},
    };
    use chrono::{Duration, Utc};
    use http_body_util::BodyExt;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde_json::{Value, json};
    use tower::ServiceExt;
    use uuid::Uuid;

    use leadboard_db::Database;
    use leadboard_gateway::dispatcher::Dispatcher;
    use leadboard_types::api::Claims;
    use leadboard_types::events::BoardEvent;

    use super::*;
    use crate::state::AppStateInner;

    const SECRET: &str = "test-secret";

    struct Harness {
        app: Router,
        state: AppState,
        token: String,
    }

    impl Harness {
        fn new() -> Self {
            let state: AppState = Arc::new(AppStateInner {
                db: Database::open_in_memory().unwrap(),
                dispatcher: Dispatcher::new(),
                jwt_secret: SECRET.into(),
                public_url: "http://leads.test/".into(),
            });
            Self {
                app: router(state.clone()),
                state,
                token: token_for(Uuid::new_v4()),
            }
        }

        async fn send(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
            self.send_as(&self.token, method, uri, body).await
        }

        async fn send_as(
            &self,
            token: &str,
            method: Method,
            uri: &str,
            body: Option<Value>,
        ) -> (StatusCode, Value) {
            let mut builder = Request::builder()
                .method(method)
                .uri(uri)
                .header(header::AUTHORIZATION, format!("Bearer {}", token));
            let body = match body {
                Some(value) => {
                    builder = builder.header(header::CONTENT_TYPE, "application/json");
                    Body::from(value.to_string())
                }
                None => Body::empty(),
            };
            request(&self.app, builder.body(body).unwrap()).await
        }

        async fn webhook(&self, token: &str, body: Value) -> (StatusCode, Value) {
            let req = Request::builder()
                .method(Method::POST)
                .uri(format!("/api/webhook/{}", token))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap();
            request(&self.app, req).await
        }

        /// Creates a board with the given column titles; returns the board id,
        /// its webhook token and the column ids in order.
        async fn board(&self, titles: &[&str]) -> (String, String, Vec<String>) {
            let columns: Vec<Value> = titles.iter().map(|t| json!({ "title": t })).collect();
            let (status, body) = self
                .send(
                    Method::POST,
                    "/boards",
                    Some(json!({ "name": "Sales", "columns": columns })),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED);
            let column_ids = body["columns"]
                .as_array()
                .unwrap()
                .iter()
                .map(|c| c["id"].as_str().unwrap().to_string())
                .collect();
            (
                body["board"]["id"].as_str().unwrap().to_string(),
                body["board"]["webhook_token"].as_str().unwrap().to_string(),
                column_ids,
            )
        }

        async fn manual_lead(&self, column_id: &str, name: &str) -> Value {
            let (status, body) = self
                .send(
                    Method::POST,
                    &format!("/columns/{}/leads", column_id),
                    Some(json!({ "name": name })),
                )
                .await;
            assert_eq!(status, StatusCode::CREATED);
            body
        }

        async fn view(&self, board_id: &str) -> Value {
            let (status, body) = self.send(Method::GET, &format!("/boards/{}", board_id), None).await;
            assert_eq!(status, StatusCode::OK);
            body
        }
    }

    fn token_for(org: Uuid) -> String {
        let claims = Claims {
            sub: Uuid::new_v4(),
            org,
            exp: (Utc::now() + Duration::hours(1)).timestamp() as usize,
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    async fn request(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let resp = app.clone().oneshot(req).await.unwrap();
        let status = resp.status();
        let bytes = resp.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, body)
    }

    /// (name, column_id, position) of every lead in a board view.
    fn placements(view: &Value) -> Vec<(String, String, i64)> {
        view["leads"]
            .as_array()
            .unwrap()
            .iter()
            .map(|l| {
                (
                    l["name"].as_str().unwrap().to_string(),
                    l["column_id"].as_str().unwrap().to_string(),
                    l["position"].as_i64().unwrap(),
                )
            })
            .collect()
    }

    fn position_of(view: &Value, name: &str) -> (String, i64) {
        placements(view)
            .into_iter()
            .find(|(n, _, _)| n == name)
            .map(|(_, column, position)| (column, position))
            .unwrap()
    }

    #[tokio::test]
    async fn health_is_public() {
        let h = Harness::new();
        let req = Request::builder().uri("/health").body(Body::empty()).unwrap();
        let (status, body) = request(&h.app, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Value::String("ok".into()));
    }

    #[tokio::test]
    async fn protected_routes_require_a_valid_token() {
        let h = Harness::new();

        let req = Request::builder().uri("/boards").body(Body::empty()).unwrap();
        let (status, body) = request(&h.app, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"], "unauthorized");

        let (status, _) = h.send_as("not-a-jwt", Method::GET, "/boards", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let req = Request::builder()
            .uri(format!("/boards?access_token={}", h.token))
            .body(Body::empty())
            .unwrap();
        let (status, _) = request(&h.app, req).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn board_creation_seeds_default_column() {
        let h = Harness::new();
        let (status, body) = h
            .send(Method::POST, "/boards", Some(json!({ "name": "Inbound" })))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["columns"][0]["title"], "New Leads");
        assert_eq!(body["columns"][0]["status"], "new");

        let board_id = body["board"]["id"].as_str().unwrap();
        let view = h.view(board_id).await;
        assert_eq!(view["board"]["name"], "Inbound");
        assert_eq!(view["columns"].as_array().unwrap().len(), 1);

        let (_, boards) = h.send(Method::GET, "/boards", None).await;
        assert_eq!(boards.as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn blank_board_name_is_rejected() {
        let h = Harness::new();
        let (status, body) = h
            .send(Method::POST, "/boards", Some(json!({ "name": "  " })))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("name"));

        let (_, boards) = h.send(Method::GET, "/boards", None).await;
        assert!(boards.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn webhook_url_uses_public_url() {
        let h = Harness::new();
        let (board_id, token, _) = h.board(&["New"]).await;
        let (status, body) = h
            .send(Method::GET, &format!("/boards/{}/webhook", board_id), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["token"], token.as_str());
        assert_eq!(body["url"], format!("http://leads.test/api/webhook/{}", token));
    }

    #[tokio::test]
    async fn webhook_leads_land_at_head_of_first_column() {
        let h = Harness::new();
        let (board_id, token, columns) = h.board(&["New", "Contacted"]).await;
        h.manual_lead(&columns[0], "Existing").await;

        let (status, lead) = h
            .webhook(&token, json!({ "first_name": "Ana", "chat_id": "5511999990000" }))
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(lead["origin"], "whatsapp");
        assert_eq!(lead["position"], 0);
        assert_eq!(lead["column_id"], columns[0].as_str());
        assert_eq!(lead["phone"], "5511999990000");

        let (status, _) = h
            .webhook(&token, json!({ "first_name": "Bruno", "phone": "5511888880000" }))
            .await;
        assert_eq!(status, StatusCode::CREATED);

        let view = h.view(&board_id).await;
        assert_eq!(position_of(&view, "Bruno"), (columns[0].clone(), 0));
        assert_eq!(position_of(&view, "Ana"), (columns[0].clone(), 1));
        assert_eq!(position_of(&view, "Existing"), (columns[0].clone(), 2));
    }

    #[tokio::test]
    async fn webhook_with_unknown_token_inserts_nothing() {
        let h = Harness::new();
        let (board_id, _, _) = h.board(&["New"]).await;

        let (status, body) = h
            .webhook("no-such-token", json!({ "first_name": "Ana", "chat_id": "1" }))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "board not found");
        assert!(placements(&h.view(&board_id).await).is_empty());
    }

    #[tokio::test]
    async fn webhook_without_name_inserts_nothing() {
        let h = Harness::new();
        let (board_id, token, _) = h.board(&["New"]).await;

        let (status, _) = h.webhook(&token, json!({ "chat_id": "1" })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = h
            .webhook(&token, json!({ "first_name": " ", "chat_id": "1" }))
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = h.webhook(&token, json!({ "first_name": "Ana" })).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        assert!(placements(&h.view(&board_id).await).is_empty());
    }

    #[tokio::test]
    async fn webhook_rejects_malformed_json() {
        let h = Harness::new();
        let (_, token, _) = h.board(&["New"]).await;
        let req = Request::builder()
            .method(Method::POST)
            .uri(format!("/api/webhook/{}", token))
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, body) = request(&h.app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].is_string());
    }

    #[tokio::test]
    async fn webhook_accepts_json_without_content_type() {
        let h = Harness::new();
        let (board_id, token, columns) = h.board(&["New"]).await;
        h.manual_lead(&columns[0], "Existing").await;

        let req = Request::builder()
            .method(Method::POST)
            .uri(format!("/api/webhook/{}", token))
            .body(Body::from(r#"{"first_name":"Ana","chat_id":"1"}"#))
            .unwrap();
        let (status, lead) = request(&h.app, req).await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(lead["position"], 0);
        assert_eq!(lead["column_id"], columns[0].as_str());

        let view = h.view(&board_id).await;
        assert_eq!(position_of(&view, "Ana"), (columns[0].clone(), 0));
        assert_eq!(position_of(&view, "Existing"), (columns[0].clone(), 1));
    }

    #[tokio::test]
    async fn webhook_rejects_empty_body() {
        let h = Harness::new();
        let (board_id, token, _) = h.board(&["New"]).await;
        let req = Request::builder()
            .method(Method::POST)
            .uri(format!("/api/webhook/{}", token))
            .body(Body::empty())
            .unwrap();
        let (status, _) = request(&h.app, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(placements(&h.view(&board_id).await).is_empty());
    }

    #[tokio::test]
    async fn webhook_on_board_without_columns_is_not_found() {
        let h = Harness::new();
        let (_, token, columns) = h.board(&["Only"]).await;
        let (status, _) = h
            .send(Method::DELETE, &format!("/columns/{}", columns[0]), None)
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = h
            .webhook(&token, json!({ "first_name": "Ana", "chat_id": "1" }))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "column not found");
    }

    #[tokio::test]
    async fn move_appends_and_compacts_source() {
        let h = Harness::new();
        let (board_id, _, columns) = h.board(&["A", "B"]).await;
        for name in ["x", "y", "z"] {
            h.manual_lead(&columns[0], name).await;
        }
        h.manual_lead(&columns[1], "w").await;
        let y = position_of(&h.view(&board_id).await, "y");
        assert_eq!(y, (columns[0].clone(), 1));

        let view = h.view(&board_id).await;
        let y_id = view["leads"]
            .as_array()
            .unwrap()
            .iter()
            .find(|l| l["name"] == "y")
            .unwrap()["id"]
            .as_str()
            .unwrap()
            .to_string();

        let (status, body) = h
            .send(
                Method::POST,
                &format!("/leads/{}/move", y_id),
                Some(json!({ "column_id": columns[1] })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["moved"], true);
        assert_eq!(body["lead"]["column_id"], columns[1].as_str());
        assert_eq!(body["lead"]["position"], 1);
        assert_eq!(body["repositioned"].as_array().unwrap().len(), 1);
        assert_eq!(body["repositioned"][0]["name"], "z");

        let view = h.view(&board_id).await;
        assert_eq!(position_of(&view, "x"), (columns[0].clone(), 0));
        assert_eq!(position_of(&view, "z"), (columns[0].clone(), 1));
        assert_eq!(position_of(&view, "w"), (columns[1].clone(), 0));
        assert_eq!(position_of(&view, "y"), (columns[1].clone(), 1));

        let (status, body) = h
            .send(
                Method::POST,
                &format!("/leads/{}/move", y_id),
                Some(json!({ "column_id": columns[1] })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["moved"], false);
        assert!(body["repositioned"].as_array().unwrap().is_empty());
        assert_eq!(placements(&h.view(&board_id).await), placements(&view));
    }

    #[tokio::test]
    async fn move_to_column_of_another_board_is_not_found() {
        let h = Harness::new();
        let (board_id, _, columns) = h.board(&["A"]).await;
        let (_, _, other_columns) = h.board(&["Elsewhere"]).await;
        let lead = h.manual_lead(&columns[0], "x").await;

        let (status, _) = h
            .send(
                Method::POST,
                &format!("/leads/{}/move", lead["id"].as_str().unwrap()),
                Some(json!({ "column_id": other_columns[0] })),
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(position_of(&h.view(&board_id).await, "x"), (columns[0].clone(), 0));
    }

    #[tokio::test]
    async fn delete_lead_leaves_a_gap() {
        let h = Harness::new();
        let (board_id, _, columns) = h.board(&["A"]).await;
        h.manual_lead(&columns[0], "x").await;
        let y = h.manual_lead(&columns[0], "y").await;
        h.manual_lead(&columns[0], "z").await;

        let (status, _) = h
            .send(Method::DELETE, &format!("/leads/{}", y["id"].as_str().unwrap()), None)
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let view = h.view(&board_id).await;
        assert_eq!(placements(&view).len(), 2);
        assert_eq!(position_of(&view, "x"), (columns[0].clone(), 0));
        assert_eq!(position_of(&view, "z"), (columns[0].clone(), 2));

        let (status, _) = h
            .send(Method::DELETE, &format!("/leads/{}", y["id"].as_str().unwrap()), None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn manual_lead_keeps_phone_digits_and_can_be_edited() {
        let h = Harness::new();
        let (_, _, columns) = h.board(&["A"]).await;
        let (status, lead) = h
            .send(
                Method::POST,
                &format!("/columns/{}/leads", columns[0]),
                Some(json!({ "name": "Ana", "phone": "+55 (11) 99999-0000", "description": "vip" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(lead["phone"], "5511999990000");
        assert_eq!(lead["origin"], "manual");

        let (status, edited) = h
            .send(
                Method::PATCH,
                &format!("/leads/{}", lead["id"].as_str().unwrap()),
                Some(json!({ "name": "Ana Souza", "description": "" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(edited["name"], "Ana Souza");
        assert_eq!(edited["phone"], "5511999990000");
        assert!(edited["description"].is_null());
    }

    #[tokio::test]
    async fn boards_of_other_organizations_are_hidden() {
        let h = Harness::new();
        let (board_id, _, columns) = h.board(&["A"]).await;
        let lead = h.manual_lead(&columns[0], "x").await;
        let stranger = token_for(Uuid::new_v4());

        let (status, body) = h
            .send_as(&stranger, Method::GET, &format!("/boards/{}", board_id), None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "board not found");

        let (status, _) = h
            .send_as(
                &stranger,
                Method::DELETE,
                &format!("/leads/{}", lead["id"].as_str().unwrap()),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (_, boards) = h.send_as(&stranger, Method::GET, "/boards", None).await;
        assert!(boards.as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn search_filters_by_name() {
        let h = Harness::new();
        let (board_id, _, columns) = h.board(&["A"]).await;
        h.manual_lead(&columns[0], "Mariana").await;
        h.manual_lead(&columns[0], "Carlos").await;

        let (status, leads) = h
            .send(Method::GET, &format!("/boards/{}/leads?search=ANA", board_id), None)
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(leads.as_array().unwrap().len(), 1);
        assert_eq!(leads[0]["name"], "Mariana");

        let (_, view) = h
            .send(Method::GET, &format!("/boards/{}?search=car", board_id), None)
            .await;
        assert_eq!(placements(&view).len(), 1);
        assert_eq!(view["columns"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn columns_are_appended_and_editable() {
        let h = Harness::new();
        let (board_id, _, _) = h.board(&["A"]).await;

        let (status, column) = h
            .send(
                Method::POST,
                &format!("/boards/{}/columns", board_id),
                Some(json!({ "title": "Won" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(column["position"], 1);
        assert_eq!(column["status"], "won");

        let (status, column) = h
            .send(
                Method::PATCH,
                &format!("/columns/{}", column["id"].as_str().unwrap()),
                Some(json!({ "title": "Closed" })),
            )
            .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(column["title"], "Closed");

        let (status, _) = h
            .send(
                Method::POST,
                &format!("/boards/{}/columns", board_id),
                Some(json!({ "title": "" })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn committed_changes_are_published() {
        let h = Harness::new();
        let (board_id, token, _) = h.board(&["A"]).await;
        let mut events = h.state.dispatcher.subscribe();

        let (status, lead) = h
            .webhook(&token, json!({ "first_name": "Ana", "chat_id": "1" }))
            .await;
        assert_eq!(status, StatusCode::CREATED);

        match events.try_recv().unwrap() {
            BoardEvent::LeadCreated(created) => {
                assert_eq!(created.id.to_string(), lead["id"].as_str().unwrap());
                assert_eq!(created.board_id.to_string(), board_id);
            }
            other => panic!("unexpected event {:?}", other),
        }

        let (status, _) = h
            .send(Method::DELETE, &format!("/boards/{}", board_id), None)
            .await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(matches!(events.try_recv().unwrap(), BoardEvent::BoardDeleted { .. }));

        let (status, _) = h.webhook(&token, json!({ "first_name": "Ana", "chat_id": "1" })).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
