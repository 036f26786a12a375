//! Session and profile commands.

use todo_client::api::{Credentials, ProfileUpdate, Registration, TodoClient};
use todo_client::error::ApiError;
use todo_client::render::Renderer;

use super::{prompt_line, prompt_new_secret, prompt_secret, CommandError, CommandResult};

pub(super) async fn login(
    renderer: &Renderer,
    client: &TodoClient,
    email: Option<String>,
) -> CommandResult {
    let email = match email {
        Some(email) => email,
        None => prompt_line("Email: ")?,
    };
    let password = prompt_secret("Password: ")?;
    let response = client
        .auth()
        .login(&Credentials { email, password })
        .await?;
    match response.user {
        Some(user) => renderer.activity(&format!("logged in as {}", user.email)),
        None => renderer.activity("logged in"),
    }
    Ok(())
}

pub(super) async fn register(
    renderer: &Renderer,
    client: &TodoClient,
    name: String,
    email: String,
) -> CommandResult {
    let password = prompt_new_secret("Password: ")?;
    let response = client
        .auth()
        .register(&Registration {
            name,
            email,
            password,
        })
        .await?;
    if response.token.is_some() {
        renderer.activity("account created; you are logged in");
    } else {
        renderer.activity("account created");
        renderer.detail("run `todo login` to sign in");
    }
    Ok(())
}

pub(super) async fn logout(renderer: &Renderer, client: &TodoClient) -> CommandResult {
    client.logout().await;
    renderer.activity("logged out");
    Ok(())
}

pub(super) async fn whoami(renderer: &Renderer, client: &TodoClient) -> CommandResult {
    if !client.auth().is_authenticated() {
        return Err(ApiError::authentication("not logged in").into());
    }
    let profile = client.user().get_profile().await?;
    renderer.section("account");
    renderer.field("name", &profile.name);
    renderer.field("email", &profile.email);
    if let Some(id) = client.auth().current_user_id() {
        renderer.field("user id", &id);
    }
    Ok(())
}

pub(super) async fn forgot_password(
    renderer: &Renderer,
    client: &TodoClient,
    email: &str,
) -> CommandResult {
    let ack = client.auth().forgot_password(email).await?;
    renderer.activity(
        ack.message
            .as_deref()
            .unwrap_or("if the address is registered, a reset link is on its way"),
    );
    Ok(())
}

pub(super) async fn reset_password(
    renderer: &Renderer,
    client: &TodoClient,
    token: &str,
) -> CommandResult {
    let check = client.auth().validate_reset_token(token).await?;
    if check.valid == Some(false) {
        return Err(ApiError::validation("reset link is invalid or has expired").into());
    }
    let password = prompt_new_secret("New password: ")?;
    let ack = client.auth().reset_password(token, &password).await?;
    renderer.activity(ack.message.as_deref().unwrap_or("password updated"));
    Ok(())
}

pub(super) async fn profile(
    renderer: &Renderer,
    client: &TodoClient,
    name: Option<String>,
    email: Option<String>,
    change_password: bool,
) -> CommandResult {
    let mut update = ProfileUpdate {
        name,
        email,
        ..ProfileUpdate::default()
    };
    if change_password {
        update.current_password = Some(prompt_secret("Current password: ")?);
        update.new_password = Some(prompt_new_secret("New password: ")?);
    }

    let profile = if update.is_empty() {
        client.user().get_profile().await?
    } else {
        let updated = client.user().update_profile(&update).await?;
        renderer.activity("profile updated");
        updated
    };
    renderer.profile(&profile);
    Ok(())
}
