//! User service
//!
//! Implements business logic for accounts:
//! - Registration (first user becomes admin)
//! - Login by username or email, returning a bearer token
//! - Profile, role and settings management
//! - Account deletion (self or admin)

use crate::db::repositories::{UserRepository, UserSettingsRepository};
use crate::db::{constraint_violation, ConstraintViolation};
use crate::models::{
    ListParams, LoginInput, PagedResult, RegisterInput, UpdateProfileInput, UpdateSettingsInput,
    User, UserRole, UserSettings,
};
use crate::services::password::{dummy_verify, hash_password, validate_password, verify_password};
use crate::services::token::{TokenError, TokenService};
use anyhow::Context;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

const USERNAME_MIN_LEN: usize = 3;
const USERNAME_MAX_LEN: usize = 32;
const DISPLAY_NAME_MAX_LEN: usize = 64;
const BIO_MAX_LEN: usize = 1000;
const THEMES: [&str; 3] = ["light", "dark", "system"];

static EMAIL_RE: Lazy<Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s.]+$"));

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    #[error("Validation error: {0}")]
    Validation(String),

    /// Bad credentials or an unusable token
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<TokenError> for UserServiceError {
    fn from(err: TokenError) -> Self {
        UserServiceError::Unauthorized(err.to_string())
    }
}

/// User service for accounts and authentication
pub struct UserService {
    users: Arc<dyn UserRepository>,
    settings: Arc<dyn UserSettingsRepository>,
    tokens: Arc<TokenService>,
}

impl UserService {
    pub fn new(
        users: Arc<dyn UserRepository>,
        settings: Arc<dyn UserSettingsRepository>,
        tokens: Arc<TokenService>,
    ) -> Self {
        Self {
            users,
            settings,
            tokens,
        }
    }

    /// Register a new account.
    ///
    /// The first account in an empty database becomes `admin`.
    ///
    /// # Errors
    /// - `Validation` for a bad username, email or password
    /// - `Conflict` if the username or email is taken
    pub async fn register(&self, input: RegisterInput) -> Result<User, UserServiceError> {
        let username = input.username.trim().to_string();
        validate_username(&username)?;
        let email = normalize_email(&input.email)?;
        validate_password(&input.password).map_err(UserServiceError::Validation)?;
        let display_name = non_empty(input.display_name);
        if let Some(ref name) = display_name {
            check_len("Display name", name, DISPLAY_NAME_MAX_LEN)?;
        }

        if self
            .users
            .get_by_username(&username)
            .await
            .context("Failed to check username")?
            .is_some()
        {
            return Err(UserServiceError::Conflict(format!(
                "Username '{}' is already taken",
                username
            )));
        }
        if self
            .users
            .get_by_email(&email)
            .await
            .context("Failed to check email")?
            .is_some()
        {
            return Err(UserServiceError::Conflict(format!(
                "Email '{}' is already registered",
                email
            )));
        }

        let password_hash = hash_password(&input.password)?;
        let mut user = User::new(username, email, password_hash, UserRole::User);
        user.display_name = display_name;

        // A concurrent registration can still win the race to the unique index.
        // The repository promotes the very first account to admin.
        let created = self.users.create_account(&user).await.map_err(|err| {
            match constraint_violation(&err) {
                Some(ConstraintViolation::Unique) => {
                    UserServiceError::Conflict("Username or email is already registered".to_string())
                }
                _ => UserServiceError::Internal(err),
            }
        })?;

        tracing::info!(user_id = created.id, role = %created.role, "User registered");
        Ok(created)
    }

    /// Log in with a username or email and a password.
    ///
    /// Returns the user together with a freshly issued bearer token.
    pub async fn login(&self, input: LoginInput) -> Result<(User, String), UserServiceError> {
        let login = input.login.trim();
        if login.is_empty() || input.password.is_empty() {
            return Err(UserServiceError::Validation(
                "Login and password are required".to_string(),
            ));
        }

        let user = if login.contains('@') {
            self.users.get_by_email(login).await
        } else {
            self.users.get_by_username(login).await
        }
        .context("Failed to look up user")?;

        let Some(user) = user else {
            dummy_verify(&input.password);
            return Err(invalid_credentials());
        };

        if !verify_password(&input.password, &user.password_hash)? {
            tracing::debug!(user_id = user.id, "Rejected login with wrong password");
            return Err(invalid_credentials());
        }

        let token = self.tokens.issue(&user)?;
        Ok((user, token))
    }

    /// Lifetime of issued tokens, in seconds
    pub fn token_ttl_seconds(&self) -> i64 {
        self.tokens.ttl_seconds()
    }

    /// Resolve a bearer token to the current state of its user.
    ///
    /// The role is read from the database, so a demoted admin loses access
    /// before the token expires.
    pub async fn authenticate(&self, token: &str) -> Result<User, UserServiceError> {
        let claims = self.tokens.verify(token)?;
        let user_id = claims.user_id()?;
        self.users
            .get_by_id(user_id)
            .await
            .context("Failed to load token user")?
            .ok_or_else(|| UserServiceError::Unauthorized("User no longer exists".to_string()))
    }

    pub async fn get_by_id(&self, id: i64) -> Result<User, UserServiceError> {
        self.users
            .get_by_id(id)
            .await
            .context("Failed to get user")?
            .ok_or_else(|| UserServiceError::NotFound(format!("User {} not found", id)))
    }

    /// List every account (admin only)
    pub async fn list(
        &self,
        actor: &User,
        params: &ListParams,
    ) -> Result<PagedResult<User>, UserServiceError> {
        require_admin(actor)?;
        let users = self
            .users
            .list(params.limit, params.offset)
            .await
            .context("Failed to list users")?;
        let total = self.users.count().await.context("Failed to count users")?;
        Ok(PagedResult::new(users, total, params))
    }

    /// Update the caller's own profile. Empty strings clear optional fields.
    pub async fn update_profile(
        &self,
        actor: &User,
        input: UpdateProfileInput,
    ) -> Result<User, UserServiceError> {
        let mut user = self.get_by_id(actor.id).await?;

        if let Some(email) = input.email {
            let email = normalize_email(&email)?;
            if email != user.email {
                if let Some(other) = self
                    .users
                    .get_by_email(&email)
                    .await
                    .context("Failed to check email")?
                {
                    if other.id != user.id {
                        return Err(UserServiceError::Conflict(format!(
                            "Email '{}' is already registered",
                            email
                        )));
                    }
                }
                user.email = email;
            }
        }
        if let Some(display_name) = input.display_name {
            let display_name = non_empty(Some(display_name));
            if let Some(ref name) = display_name {
                check_len("Display name", name, DISPLAY_NAME_MAX_LEN)?;
            }
            user.display_name = display_name;
        }
        if let Some(bio) = input.bio {
            let bio = non_empty(Some(bio));
            if let Some(ref text) = bio {
                check_len("Bio", text, BIO_MAX_LEN)?;
            }
            user.bio = bio;
        }
        if let Some(avatar_url) = input.avatar_url {
            user.avatar_url = non_empty(Some(avatar_url));
        }
        if let Some(password) = input.password {
            validate_password(&password).map_err(UserServiceError::Validation)?;
            user.password_hash = hash_password(&password)?;
        }

        self.users.update(&user).await.map_err(|err| match constraint_violation(&err) {
            Some(ConstraintViolation::Unique) => {
                UserServiceError::Conflict("Email is already registered".to_string())
            }
            _ => UserServiceError::Internal(err),
        })
    }

    /// Change a user's role (admin only). Admins cannot change their own role.
    pub async fn set_role(
        &self,
        actor: &User,
        id: i64,
        role: UserRole,
    ) -> Result<User, UserServiceError> {
        require_admin(actor)?;
        if actor.id == id {
            return Err(UserServiceError::Validation(
                "Admins cannot change their own role".to_string(),
            ));
        }

        let user = self
            .users
            .set_role(id, role)
            .await
            .context("Failed to set role")?
            .ok_or_else(|| UserServiceError::NotFound(format!("User {} not found", id)))?;

        tracing::info!(user_id = id, role = %role, by = actor.id, "User role changed");
        Ok(user)
    }

    /// Delete an account. Users may delete themselves; admins anyone.
    pub async fn delete(&self, actor: &User, id: i64) -> Result<(), UserServiceError> {
        if !actor.can_modify(id) {
            return Err(UserServiceError::Forbidden(
                "You can only delete your own account".to_string(),
            ));
        }
        if !self.users.delete(id).await.context("Failed to delete user")? {
            return Err(UserServiceError::NotFound(format!("User {} not found", id)));
        }

        tracing::info!(user_id = id, by = actor.id, "User deleted");
        Ok(())
    }

    pub async fn get_settings(&self, user_id: i64) -> Result<UserSettings, UserServiceError> {
        self.settings
            .get(user_id)
            .await
            .context("Failed to get settings")?
            .ok_or_else(|| UserServiceError::NotFound(format!("Settings for user {} not found", user_id)))
    }

    pub async fn update_settings(
        &self,
        user_id: i64,
        input: UpdateSettingsInput,
    ) -> Result<UserSettings, UserServiceError> {
        let mut settings = self.get_settings(user_id).await?;

        if let Some(value) = input.email_notifications {
            settings.email_notifications = value;
        }
        if let Some(value) = input.profile_public {
            settings.profile_public = value;
        }
        if let Some(theme) = input.theme {
            let theme = theme.trim().to_lowercase();
            if !THEMES.contains(&theme.as_str()) {
                return Err(UserServiceError::Validation(format!(
                    "Theme must be one of: {}",
                    THEMES.join(", ")
                )));
            }
            settings.theme = theme;
        }
        if let Some(language) = input.language {
            let language = language.trim().to_string();
            if language.is_empty() || language.len() > 16 {
                return Err(UserServiceError::Validation(
                    "Language must be 1 to 16 characters".to_string(),
                ));
            }
            settings.language = language;
        }

        self.settings
            .update(&settings)
            .await
            .context("Failed to update settings")?
            .ok_or_else(|| UserServiceError::NotFound(format!("Settings for user {} not found", user_id)))
    }
}

fn invalid_credentials() -> UserServiceError {
    UserServiceError::Unauthorized("Invalid username or password".to_string())
}

fn require_admin(actor: &User) -> Result<(), UserServiceError> {
    if actor.is_admin() {
        Ok(())
    } else {
        Err(UserServiceError::Forbidden("Admin access required".to_string()))
    }
}

/// Usernames are 3-32 ASCII letters, digits or underscores
pub fn validate_username(username: &str) -> Result<(), UserServiceError> {
    let len = username.chars().count();
    if !(USERNAME_MIN_LEN..=USERNAME_MAX_LEN).contains(&len) {
        return Err(UserServiceError::Validation(format!(
            "Username must be {} to {} characters",
            USERNAME_MIN_LEN, USERNAME_MAX_LEN
        )));
    }
    if !username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(UserServiceError::Validation(
            "Username may only contain letters, digits and underscores".to_string(),
        ));
    }
    Ok(())
}

/// Trim, validate and lowercase an email address
pub fn normalize_email(email: &str) -> Result<String, UserServiceError> {
    let email = email.trim().to_lowercase();
    let re = EMAIL_RE
        .as_ref()
        .map_err(|e| anyhow::anyhow!("Invalid email pattern: {}", e))?;
    if email.len() > 254 || !re.is_match(&email) {
        return Err(UserServiceError::Validation(format!(
            "Invalid email address: {}",
            email
        )));
    }
    Ok(email)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn check_len(field: &str, value: &str, max: usize) -> Result<(), UserServiceError> {
    if value.chars().count() > max {
        return Err(UserServiceError::Validation(format!(
            "{} must be at most {} characters",
            field, max
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::SqlxUserRepository;
    use crate::db::{create_test_pool, migrations};
    use proptest::prelude::*;

    async fn setup_test_service() -> UserService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        UserService::new(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxUserRepository::boxed_settings(pool),
            Arc::new(TokenService::new("user-service-test-secret", 24)),
        )
    }

    fn register_input(username: &str, email: &str) -> RegisterInput {
        RegisterInput {
            username: username.to_string(),
            email: email.to_string(),
            password: "password123".to_string(),
            display_name: None,
        }
    }

    #[tokio::test]
    async fn test_first_user_becomes_admin() {
        let service = setup_test_service().await;

        let first = service.register(register_input("admin", "admin@example.com")).await.unwrap();
        let second = service.register(register_input("reader", "reader@example.com")).await.unwrap();

        assert_eq!(first.role, UserRole::Admin);
        assert_eq!(second.role, UserRole::User);
        assert!(first.password_hash.starts_with("$argon2id$"));
    }

    #[tokio::test]
    async fn test_register_normalizes_email() {
        let service = setup_test_service().await;
        let user = service
            .register(register_input("mixed", "  Mixed.Case@Example.COM "))
            .await
            .unwrap();
        assert_eq!(user.email, "mixed.case@example.com");
    }

    #[tokio::test]
    async fn test_register_duplicates_conflict() {
        let service = setup_test_service().await;
        service.register(register_input("taken", "taken@example.com")).await.unwrap();

        let by_name = service.register(register_input("taken", "other@example.com")).await;
        assert!(matches!(by_name, Err(UserServiceError::Conflict(_))));

        let by_email = service.register(register_input("other", "TAKEN@example.com")).await;
        assert!(matches!(by_email, Err(UserServiceError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_register_validation() {
        let service = setup_test_service().await;

        let short = service.register(register_input("ab", "ab@example.com")).await;
        assert!(matches!(short, Err(UserServiceError::Validation(_))));

        let bad_chars = service.register(register_input("bad-name", "b@example.com")).await;
        assert!(matches!(bad_chars, Err(UserServiceError::Validation(_))));

        let bad_email = service.register(register_input("gooduser", "not-an-email")).await;
        assert!(matches!(bad_email, Err(UserServiceError::Validation(_))));

        let mut weak = register_input("weakuser", "weak@example.com");
        weak.password = "short".to_string();
        assert!(matches!(service.register(weak).await, Err(UserServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn test_login_by_username_and_email() {
        let service = setup_test_service().await;
        let user = service.register(register_input("login", "login@example.com")).await.unwrap();

        let (by_name, token) = service
            .login(LoginInput { login: "login".into(), password: "password123".into() })
            .await
            .unwrap();
        assert_eq!(by_name.id, user.id);

        let (by_email, _) = service
            .login(LoginInput { login: "LOGIN@example.com".into(), password: "password123".into() })
            .await
            .unwrap();
        assert_eq!(by_email.id, user.id);

        let authenticated = service.authenticate(&token).await.unwrap();
        assert_eq!(authenticated.id, user.id);
    }

    #[tokio::test]
    async fn test_login_rejects_bad_credentials() {
        let service = setup_test_service().await;
        service.register(register_input("victim", "victim@example.com")).await.unwrap();

        let wrong = service
            .login(LoginInput { login: "victim".into(), password: "wrongpassword".into() })
            .await;
        assert!(matches!(wrong, Err(UserServiceError::Unauthorized(_))));

        let unknown = service
            .login(LoginInput { login: "ghost".into(), password: "password123".into() })
            .await;
        assert!(matches!(unknown, Err(UserServiceError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_authenticate_rejects_garbage_and_deleted_users() {
        let service = setup_test_service().await;
        assert!(matches!(
            service.authenticate("garbage").await,
            Err(UserServiceError::Unauthorized(_))
        ));

        let admin = service.register(register_input("root", "root@example.com")).await.unwrap();
        let user = service.register(register_input("gone", "gone@example.com")).await.unwrap();
        let (_, token) = service
            .login(LoginInput { login: "gone".into(), password: "password123".into() })
            .await
            .unwrap();
        service.delete(&admin, user.id).await.unwrap();

        assert!(matches!(
            service.authenticate(&token).await,
            Err(UserServiceError::Unauthorized(_))
        ));
    }

    #[tokio::test]
    async fn test_list_requires_admin() {
        let service = setup_test_service().await;
        let admin = service.register(register_input("boss", "boss@example.com")).await.unwrap();
        let user = service.register(register_input("worker", "worker@example.com")).await.unwrap();
        let params = ListParams::new(None, None).unwrap();

        let page = service.list(&admin, &params).await.unwrap();
        assert_eq!(page.total, 2);
        assert_eq!(page.items.len(), 2);

        assert!(matches!(
            service.list(&user, &params).await,
            Err(UserServiceError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_update_profile() {
        let service = setup_test_service().await;
        let user = service.register(register_input("profile", "profile@example.com")).await.unwrap();
        service.register(register_input("someone", "someone@example.com")).await.unwrap();

        let updated = service
            .update_profile(
                &user,
                UpdateProfileInput {
                    display_name: Some("Profile Owner".into()),
                    bio: Some("Hello".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.display_name.as_deref(), Some("Profile Owner"));
        assert_eq!(updated.bio.as_deref(), Some("Hello"));

        let cleared = service
            .update_profile(&user, UpdateProfileInput { bio: Some("  ".into()), ..Default::default() })
            .await
            .unwrap();
        assert!(cleared.bio.is_none());

        let taken = service
            .update_profile(
                &user,
                UpdateProfileInput { email: Some("someone@example.com".into()), ..Default::default() },
            )
            .await;
        assert!(matches!(taken, Err(UserServiceError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_password_change_allows_new_login() {
        let service = setup_test_service().await;
        let user = service.register(register_input("changer", "changer@example.com")).await.unwrap();

        service
            .update_profile(
                &user,
                UpdateProfileInput { password: Some("brand-new-password".into()), ..Default::default() },
            )
            .await
            .unwrap();

        let old = service
            .login(LoginInput { login: "changer".into(), password: "password123".into() })
            .await;
        assert!(matches!(old, Err(UserServiceError::Unauthorized(_))));
        assert!(service
            .login(LoginInput { login: "changer".into(), password: "brand-new-password".into() })
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_set_role() {
        let service = setup_test_service().await;
        let admin = service.register(register_input("chief", "chief@example.com")).await.unwrap();
        let user = service.register(register_input("member", "member@example.com")).await.unwrap();

        let promoted = service.set_role(&admin, user.id, UserRole::Admin).await.unwrap();
        assert!(promoted.is_admin());

        assert!(matches!(
            service.set_role(&admin, admin.id, UserRole::User).await,
            Err(UserServiceError::Validation(_))
        ));
        assert!(matches!(
            service.set_role(&admin, 9999, UserRole::Admin).await,
            Err(UserServiceError::NotFound(_))
        ));
        assert!(matches!(
            service.set_role(&user, admin.id, UserRole::User).await,
            Err(UserServiceError::Forbidden(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_self_or_admin() {
        let service = setup_test_service().await;
        let admin = service.register(register_input("owner", "owner@example.com")).await.unwrap();
        let alice = service.register(register_input("alice", "alice@example.com")).await.unwrap();
        let bob = service.register(register_input("bob_b", "bob@example.com")).await.unwrap();

        assert!(matches!(
            service.delete(&alice, bob.id).await,
            Err(UserServiceError::Forbidden(_))
        ));

        service.delete(&alice, alice.id).await.unwrap();
        service.delete(&admin, bob.id).await.unwrap();
        assert!(matches!(service.get_by_id(bob.id).await, Err(UserServiceError::NotFound(_))));
        assert!(matches!(
            service.delete(&admin, bob.id).await,
            Err(UserServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_settings_round_trip() {
        let service = setup_test_service().await;
        let user = service.register(register_input("prefs", "prefs@example.com")).await.unwrap();

        let defaults = service.get_settings(user.id).await.unwrap();
        assert_eq!(defaults.theme, "system");

        let updated = service
            .update_settings(
                user.id,
                UpdateSettingsInput {
                    theme: Some("Dark".into()),
                    profile_public: Some(false),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.theme, "dark");
        assert!(!updated.profile_public);
        assert_eq!(updated.language, defaults.language);

        let bad_theme = service
            .update_settings(user.id, UpdateSettingsInput { theme: Some("neon".into()), ..Default::default() })
            .await;
        assert!(matches!(bad_theme, Err(UserServiceError::Validation(_))));
    }

    proptest! {
        #[test]
        fn valid_usernames_accepted(name in "[A-Za-z0-9_]{3,32}") {
            prop_assert!(validate_username(&name).is_ok());
        }

        #[test]
        fn usernames_with_other_characters_rejected(prefix in "[a-z]{2,10}", bad in "[-. @!]") {
            let name = format!("{}{}", prefix, bad);
            prop_assert!(validate_username(&name).is_err());
        }
    }
}
