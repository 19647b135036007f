mod common;

use serde_json::json;

use common::{TestApp, body_json};

#[tokio::test]
async fn health_endpoint_responds() {
    let app = TestApp::start().await;
    let resp = app.get("/health", None).await;
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn registration_activation_and_login_lifecycle() {
    let app = TestApp::start().await;

    let resp = app
        .post(
            "/api/v1/accounts/register",
            None,
            &json!({
                "username": "alice",
                "email": "alice@example.com",
                "password": "correct horse battery",
            }),
        )
        .await;
    assert_eq!(resp.status(), 201);
    let body = body_json(resp).await;
    let user_id = body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["is_active"], false);

    // Activation email was sent (best-effort, captured by the memory mailer)
    let sent = app.mailer.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].to, "alice@example.com");

    // Login is rejected until the account is activated
    let resp = app
        .post(
            "/api/v1/accounts/login",
            None,
            &json!({ "identifier": "alice", "password": "correct horse battery" }),
        )
        .await;
    assert_eq!(resp.status(), 403);

    let token = app
        .signer
        .sign(canvass::share::ACCOUNT_ACTIVATE_SALT, &user_id);
    let resp = app
        .post("/api/v1/accounts/activate", None, &json!({ "token": token }))
        .await;
    assert_eq!(resp.status(), 200);

    // Wrong password stays out
    let resp = app
        .post(
            "/api/v1/accounts/login",
            None,
            &json!({ "identifier": "alice", "password": "wrong" }),
        )
        .await;
    assert_eq!(resp.status(), 401);

    // Login by email works and binds the session
    let resp = app
        .post(
            "/api/v1/accounts/login",
            None,
            &json!({ "identifier": "alice@example.com", "password": "correct horse battery" }),
        )
        .await;
    assert_eq!(resp.status(), 200);
    let session = resp.headers()["x-session-id"].to_str().unwrap().to_string();

    let resp = app.get("/api/v1/accounts/me", Some(&session)).await;
    assert_eq!(resp.status(), 200);
    let body = body_json(resp).await;
    assert_eq!(body["data"]["username"], "alice");

    // Logout unbinds it
    let resp = app
        .post("/api/v1/accounts/logout", Some(&session), &json!({}))
        .await;
    assert_eq!(resp.status(), 204);
    let resp = app.get("/api/v1/accounts/me", Some(&session)).await;
    assert_eq!(resp.status(), 401);
}

#[tokio::test]
async fn duplicate_registration_is_rejected() {
    let app = TestApp::start().await;
    app.signup("alice").await;

    let resp = app
        .post(
            "/api/v1/accounts/register",
            None,
            &json!({
                "username": "alice",
                "email": "other@example.com",
                "password": "correct horse battery",
            }),
        )
        .await;
    assert_eq!(resp.status(), 409);

    let resp = app
        .post(
            "/api/v1/accounts/register",
            None,
            &json!({
                "username": "alice2",
                "email": "ALICE@example.com",
                "password": "correct horse battery",
            }),
        )
        .await;
    assert_eq!(resp.status(), 409, "emails match case-insensitively");
}

#[tokio::test]
async fn password_reset_flow() {
    let app = TestApp::start().await;
    let alice = app.signup("alice").await;

    let resp = app
        .post(
            "/api/v1/accounts/password-reset/request",
            None,
            &json!({ "email": "alice@example.com" }),
        )
        .await;
    assert_eq!(resp.status(), 202);

    // Unknown addresses get the same answer
    let resp = app
        .post(
            "/api/v1/accounts/password-reset/request",
            None,
            &json!({ "email": "nobody@example.com" }),
        )
        .await;
    assert_eq!(resp.status(), 202);

    let token = app
        .signer
        .sign(canvass::share::PASSWORD_RESET_SALT, &alice.user_id);
    let resp = app
        .post(
            "/api/v1/accounts/password-reset/confirm",
            None,
            &json!({ "token": token, "password": "a brand new passphrase" }),
        )
        .await;
    assert_eq!(resp.status(), 200);

    let resp = app
        .post(
            "/api/v1/accounts/login",
            None,
            &json!({ "identifier": "alice", "password": "a brand new passphrase" }),
        )
        .await;
    assert_eq!(resp.status(), 200);
}

#[tokio::test]
async fn surveys_start_as_drafts_and_are_soft_deleted() {
    let app = TestApp::start().await;
    let alice = app.signup("alice").await;

    let survey_id = app.create_survey(&alice, json!({})).await;

    let resp = app
        .get(&format!("/api/v1/surveys/{survey_id}"), Some(&alice.session))
        .await;
    let body = body_json(resp).await;
    assert_eq!(body["data"]["is_active"], false);
    assert_eq!(body["data"]["can_edit"], true);

    // Draft surveys read as closed to respondents
    let resp = app
        .get(&format!("/api/v1/surveys/{survey_id}/form"), None)
        .await;
    let body = body_json(resp).await;
    assert_eq!(body["status"], "closed");

    app.publish(&alice, &survey_id).await;
    let resp = app
        .get(&format!("/api/v1/surveys/{survey_id}/form"), None)
        .await;
    let body = body_json(resp).await;
    assert_eq!(body["status"], "open");

    // Soft delete hides the survey but keeps accepting nothing
    let resp = app
        .delete(&format!("/api/v1/surveys/{survey_id}"), Some(&alice.session))
        .await;
    assert_eq!(resp.status(), 204);

    let resp = app
        .get(&format!("/api/v1/surveys/{survey_id}"), Some(&alice.session))
        .await;
    assert_eq!(resp.status(), 404);

    let resp = app
        .get(&format!("/api/v1/surveys/{survey_id}/form"), None)
        .await;
    let body = body_json(resp).await;
    assert_eq!(body["status"], "closed");

    let resp = app.get("/api/v1/surveys", Some(&alice.session)).await;
    let body = body_json(resp).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn editing_requires_edit_access() {
    let app = TestApp::start().await;
    let alice = app.signup("alice").await;
    let mallory = app.signup("mallory").await;

    let survey_id = app.create_survey(&alice, json!({})).await;

    let resp = app
        .patch(
            &format!("/api/v1/surveys/{survey_id}"),
            Some(&mallory.session),
            &json!({ "title": "Hijacked" }),
        )
        .await;
    assert_eq!(resp.status(), 403);

    let resp = app
        .post(
            &format!("/api/v1/surveys/{survey_id}/questions"),
            Some(&mallory.session),
            &json!({ "text": "Evil question", "kind": "text" }),
        )
        .await;
    assert_eq!(resp.status(), 403);

    // Nothing changed
    let resp = app
        .get(&format!("/api/v1/surveys/{survey_id}"), Some(&alice.session))
        .await;
    let body = body_json(resp).await;
    assert_eq!(body["data"]["title"], "Team lunch survey");
    assert_eq!(body["data"]["questions"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn question_options_are_positional() {
    let app = TestApp::start().await;
    let alice = app.signup("alice").await;
    let survey_id = app.create_survey(&alice, json!({})).await;

    let question_id = app
        .add_question(
            &alice,
            &survey_id,
            json!({
                "text": "Favorite day?",
                "kind": "single",
                "options": ["Mon", " Tue ", "", "Wed"],
            }),
        )
        .await;

    // Blank options are dropped, the rest trimmed
    let resp = app
        .get(&format!("/api/v1/surveys/{survey_id}"), Some(&alice.session))
        .await;
    let body = body_json(resp).await;
    assert_eq!(
        body["data"]["questions"][0]["options"],
        json!(["Mon", "Tue", "Wed"])
    );

    let resp = app
        .post(
            &format!("/api/v1/questions/{question_id}/options"),
            Some(&alice.session),
            &json!({ "text": "Thu" }),
        )
        .await;
    assert_eq!(resp.status(), 200);

    // Removing index 1 shifts everything after it down
    let resp = app
        .delete(
            &format!("/api/v1/questions/{question_id}/options/1"),
            Some(&alice.session),
        )
        .await;
    assert_eq!(resp.status(), 200);
    let body = body_json(resp).await;
    assert_eq!(body["data"]["options"], json!(["Mon", "Wed", "Thu"]));

    let resp = app
        .delete(
            &format!("/api/v1/questions/{question_id}/options/5"),
            Some(&alice.session),
        )
        .await;
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn questions_can_be_reordered() {
    let app = TestApp::start().await;
    let alice = app.signup("alice").await;
    let survey_id = app.create_survey(&alice, json!({})).await;

    let q1 = app
        .add_question(&alice, &survey_id, json!({ "text": "One", "kind": "text" }))
        .await;
    let q2 = app
        .add_question(&alice, &survey_id, json!({ "text": "Two", "kind": "text" }))
        .await;

    let resp = app
        .post(
            &format!("/api/v1/surveys/{survey_id}/questions/reorder"),
            Some(&alice.session),
            &json!({ "question_ids": [q2, q1] }),
        )
        .await;
    assert_eq!(resp.status(), 200);
    let body = body_json(resp).await;
    assert_eq!(body["data"][0]["text"], "Two");
    assert_eq!(body["data"][1]["text"], "One");
}

#[tokio::test]
async fn collaborator_roles_gate_capabilities() {
    let app = TestApp::start().await;
    let alice = app.signup("alice").await;
    let bob = app.signup("bob").await;
    let carol = app.signup("carol").await;

    let survey_id = app.create_survey(&alice, json!({})).await;
    app.add_question(
        &alice,
        &survey_id,
        json!({ "text": "Q", "kind": "text", "is_required": false }),
    )
    .await;

    // Only the owner can manage collaborators
    let resp = app
        .post(
            &format!("/api/v1/surveys/{survey_id}/collaborators"),
            Some(&bob.session),
            &json!({ "user": "carol", "role": "editor" }),
        )
        .await;
    assert_eq!(resp.status(), 403);

    let resp = app
        .post(
            &format!("/api/v1/surveys/{survey_id}/collaborators"),
            Some(&alice.session),
            &json!({ "user": "bob", "role": "editor" }),
        )
        .await;
    assert_eq!(resp.status(), 201);
    let resp = app
        .post(
            &format!("/api/v1/surveys/{survey_id}/collaborators"),
            Some(&alice.session),
            &json!({ "user": "carol@example.com", "role": "viewer" }),
        )
        .await;
    assert_eq!(resp.status(), 201);

    // Editors edit but cannot view collaborator management
    let resp = app
        .patch(
            &format!("/api/v1/surveys/{survey_id}"),
            Some(&bob.session),
            &json!({ "description": "Edited by bob" }),
        )
        .await;
    assert_eq!(resp.status(), 200);
    let resp = app
        .get(
            &format!("/api/v1/surveys/{survey_id}/collaborators"),
            Some(&bob.session),
        )
        .await;
    assert_eq!(resp.status(), 403);

    // Viewers see results but cannot edit
    let resp = app
        .get(
            &format!("/api/v1/surveys/{survey_id}/results"),
            Some(&carol.session),
        )
        .await;
    assert_eq!(resp.status(), 200);
    let resp = app
        .patch(
            &format!("/api/v1/surveys/{survey_id}"),
            Some(&carol.session),
            &json!({ "title": "Nope" }),
        )
        .await;
    assert_eq!(resp.status(), 403);

    // Editors cannot publish; owners can
    let resp = app
        .post(
            &format!("/api/v1/surveys/{survey_id}/publish"),
            Some(&bob.session),
            &json!({}),
        )
        .await;
    assert_eq!(resp.status(), 403);
    app.publish(&alice, &survey_id).await;
}

#[tokio::test]
async fn last_owner_cannot_be_removed() {
    let app = TestApp::start().await;
    let alice = app.signup("alice").await;
    let bob = app.signup("bob").await;

    let survey_id = app.create_survey(&alice, json!({})).await;
    let collab_base = format!("/api/v1/surveys/{survey_id}/collaborators");

    // The creator's implicit owner role is untouchable
    let resp = app
        .patch(
            &format!("{collab_base}/{}", alice.user_id),
            Some(&alice.session),
            &json!({ "role": "viewer" }),
        )
        .await;
    assert_eq!(resp.status(), 409);
    let resp = app
        .delete(&format!("{collab_base}/{}", alice.user_id), Some(&alice.session))
        .await;
    assert_eq!(resp.status(), 409);

    // A second owner can be added and removed while the creator row remains
    let resp = app
        .post(
            &collab_base,
            Some(&alice.session),
            &json!({ "user": "bob", "role": "owner" }),
        )
        .await;
    assert_eq!(resp.status(), 201);
    let resp = app
        .delete(&format!("{collab_base}/{}", bob.user_id), Some(&alice.session))
        .await;
    assert_eq!(resp.status(), 204);

    // Collaborator set is unchanged: only the creator's owner row remains
    let resp = app.get(&collab_base, Some(&alice.session)).await;
    let body = body_json(resp).await;
    let entries = body["data"].as_array().unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0]["username"], "alice");
    assert_eq!(entries[0]["role"], "owner");
}

#[tokio::test]
async fn share_tokens_round_trip_and_reject_tampering() {
    let app = TestApp::start().await;
    let alice = app.signup("alice").await;
    let survey_id = app.create_survey(&alice, json!({})).await;

    let resp = app
        .get(
            &format!("/api/v1/surveys/{survey_id}/share-link"),
            Some(&alice.session),
        )
        .await;
    assert_eq!(resp.status(), 200);
    let body = body_json(resp).await;
    let token = body["data"]["token"].as_str().unwrap().to_string();

    let resp = app.get(&format!("/api/v1/shared/{token}"), None).await;
    assert_eq!(resp.status(), 200);
    let body = body_json(resp).await;
    assert_eq!(body["data"]["survey_id"], survey_id.as_str());

    // Flip a character in the payload half
    let mut tampered = token.clone();
    let first = if tampered.starts_with('A') { "B" } else { "A" };
    tampered.replace_range(0..1, first);
    let resp = app.get(&format!("/api/v1/shared/{tampered}"), None).await;
    assert_eq!(resp.status(), 400);

    // Strangers cannot mint share links
    let mallory = app.signup("mallory").await;
    let resp = app
        .get(
            &format!("/api/v1/surveys/{survey_id}/share-link"),
            Some(&mallory.session),
        )
        .await;
    assert_eq!(resp.status(), 403);
}

#[tokio::test]
async fn results_aggregate_and_export() {
    let app = TestApp::start().await;
    let alice = app.signup("alice").await;
    let survey_id = app
        .create_survey(&alice, json!({ "one_response_only": false }))
        .await;

    app.add_question(
        &alice,
        &survey_id,
        json!({
            "text": "Pick one",
            "kind": "single",
            "options": ["A", "B", "C"],
        }),
    )
    .await;
    app.add_question(
        &alice,
        &survey_id,
        json!({
            "text": "Anything else?",
            "kind": "text",
            "is_required": false,
        }),
    )
    .await;
    app.publish(&alice, &survey_id).await;

    // Three anonymous submissions from distinct addresses: A, A, B
    let form = body_json(
        app.get(&format!("/api/v1/surveys/{survey_id}/form"), None)
            .await,
    )
    .await;
    let q_single = form["fields"][0]["question_id"].as_str().unwrap().to_string();
    let q_text = form["fields"][1]["question_id"].as_str().unwrap().to_string();

    for (i, index) in [0, 0, 1].iter().enumerate() {
        let resp = app
            .post_from(
                &format!("/api/v1/surveys/{survey_id}/responses"),
                None,
                &format!("10.0.0.{i}"),
                &json!({
                    "captcha_token": "tok",
                    "answers": { &q_single: index, &q_text: format!("note {i}") },
                }),
            )
            .await;
        assert_eq!(resp.status(), 201);
    }

    let resp = app
        .get(
            &format!("/api/v1/surveys/{survey_id}/results"),
            Some(&alice.session),
        )
        .await;
    assert_eq!(resp.status(), 200);
    let body = body_json(resp).await;
    assert_eq!(body["data"]["total_responses"], 3);
    let choices = &body["data"]["questions"][0]["choices"];
    assert_eq!(choices[0]["count"], 2);
    assert_eq!(choices[0]["percentage"], 66.7);
    assert_eq!(choices[1]["count"], 1);
    assert_eq!(choices[1]["percentage"], 33.3);
    assert_eq!(choices[2]["count"], 0);
    assert_eq!(choices[2]["percentage"], 0.0);
    assert_eq!(body["data"]["questions"][1]["total"], 3);

    // Anonymous callers and strangers cannot see results
    let resp = app
        .get(&format!("/api/v1/surveys/{survey_id}/results"), None)
        .await;
    assert_eq!(resp.status(), 401);
    let mallory = app.signup("mallory").await;
    let resp = app
        .get(
            &format!("/api/v1/surveys/{survey_id}/results"),
            Some(&mallory.session),
        )
        .await;
    assert_eq!(resp.status(), 403);

    // CSV export: header + one row per response
    let resp = app
        .get(
            &format!("/api/v1/surveys/{survey_id}/export.csv"),
            Some(&alice.session),
        )
        .await;
    assert_eq!(resp.status(), 200);
    assert!(
        resp.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/csv")
    );
    let csv = resp.text().await.unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines.len(), 4);
    assert_eq!(lines[0], "Submitted at,Pick one,Anything else?");
    assert!(lines[1].ends_with(",A,note 0"));
    assert!(lines[3].ends_with(",B,note 2"));
}
