//! Superuser bootstrap command handler

use crate::config::Config;
use crate::services::AuthError;
use crate::state::SharedState;

pub async fn cmd_create_superuser(config: Config, username: &str, email: &str) -> anyhow::Result<()> {
    let shared = SharedState::new(config).await?;

    let (user, code) = match shared.auth_service.create_superuser(username, email).await {
        Ok(created) => created,
        Err(AuthError::Validation(errors)) => {
            println!("Cannot create superuser:");
            for (field, messages) in errors.iter() {
                for message in messages {
                    println!("  {field}: {message}");
                }
            }
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    println!("Superuser ready");
    println!("  ID:       {}", user.id);
    println!("  Username: {}", user.username);
    println!("  Email:    {}", user.email);
    println!("  Role:     {}", user.role);
    println!();
    println!("Confirmation code: {code}");
    println!("Exchange it at POST /v1/auth/token/ for an access token.");

    Ok(())
}
