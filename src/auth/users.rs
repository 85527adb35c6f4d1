use rusqlite::{params, Connection, OptionalExtension};
use serde::Deserialize;
use validator::Validate;

use crate::auth::password::{hash_password, verify_password};
use crate::db::models::User;
use crate::error::{is_unique_violation, AppError, AppResult};

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    #[validate(length(min = 2, max = 50))]
    pub full_name: String,
    #[validate(email, length(max = 254))]
    pub email: String,
    #[validate(length(min = 6, max = 180))]
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Credentials {
    #[validate(email, length(max = 254))]
    pub email: String,
    #[validate(length(min = 6, max = 180))]
    pub password: String,
    /// HTML checkboxes submit "on"; absent means unticked.
    #[serde(default)]
    pub remember: Option<String>,
}

impl Registration {
    /// Trimmed name and trimmed, lowercased email; validation runs on this.
    fn normalized(&self) -> Registration {
        Registration {
            full_name: self.full_name.trim().to_string(),
            email: self.email.trim().to_lowercase(),
            password: self.password.clone(),
        }
    }
}

impl Credentials {
    fn normalized(&self) -> Credentials {
        Credentials {
            email: self.email.trim().to_lowercase(),
            ..self.clone()
        }
    }

    pub fn remember(&self) -> bool {
        matches!(self.remember.as_deref(), Some("on" | "true" | "1"))
    }
}

fn email_taken() -> AppError {
    AppError::Conflict("An account with this email already exists".into())
}

pub fn find_by_email(conn: &Connection, email: &str) -> AppResult<Option<User>> {
    let user = conn
        .query_row(
            &format!("SELECT {} FROM users WHERE email = ?1", User::COLUMNS),
            params![email],
            User::from_row,
        )
        .optional()?;
    Ok(user)
}

pub fn register(conn: &Connection, form: &Registration) -> AppResult<User> {
    let form = form.normalized();
    form.validate()?;
    let email = form.email.as_str();

    if find_by_email(conn, email)?.is_some() {
        return Err(email_taken());
    }

    let password_hash = hash_password(&form.password)?;
    let inserted = conn.execute(
        "INSERT INTO users (full_name, email, password_hash) VALUES (?1, ?2, ?3)",
        params![form.full_name, email, password_hash],
    );
    match inserted {
        Ok(_) => {}
        Err(e) if is_unique_violation(&e) => return Err(email_taken()),
        Err(e) => return Err(e.into()),
    }

    let user = find_by_email(conn, email)?.ok_or(AppError::NotFound)?;
    tracing::info!("Registered user {} <{}>", user.id, user.email);
    Ok(user)
}

/// Check an email/password pair. Unknown email and wrong password are
/// indistinguishable to the caller.
pub fn authenticate(conn: &Connection, credentials: &Credentials) -> AppResult<User> {
    let credentials = credentials.normalized();
    credentials.validate()?;
    let email = credentials.email.as_str();

    let user = find_by_email(conn, email)?.ok_or(AppError::Unauthorized)?;
    if !verify_password(&credentials.password, &user.password_hash) {
        tracing::warn!("Failed login for {}", email);
        return Err(AppError::Unauthorized);
    }
    Ok(user)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::state::DbPool;

    fn test_pool() -> DbPool {
        let pool = db::create_memory_pool().unwrap();
        db::run_migrations(&pool).unwrap();
        pool
    }

    fn registration(email: &str) -> Registration {
        Registration {
            full_name: "Ada Lovelace".into(),
            email: email.into(),
            password: "engines".into(),
        }
    }

    fn credentials(email: &str, password: &str) -> Credentials {
        Credentials {
            email: email.into(),
            password: password.into(),
            remember: None,
        }
    }

    #[test]
    fn register_then_authenticate() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let user = register(&conn, &registration("Ada@Example.com")).unwrap();
        assert_eq!(user.email, "ada@example.com");
        assert_ne!(user.password_hash, "engines");

        let signed_in = authenticate(&conn, &credentials("ada@example.com", "engines")).unwrap();
        assert_eq!(signed_in.id, user.id);
    }

    #[test]
    fn surrounding_whitespace_is_trimmed_before_validation() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let padded = Registration {
            full_name: "  Ada Lovelace ".into(),
            ..registration(" ada@example.com ")
        };
        let user = register(&conn, &padded).unwrap();
        assert_eq!(user.email, "ada@example.com");
        assert_eq!(user.full_name, "Ada Lovelace");

        let signed_in = authenticate(&conn, &credentials("\tADA@example.com ", "engines")).unwrap();
        assert_eq!(signed_in.id, user.id);

        let padded_short_name = Registration {
            full_name: " A ".into(),
            ..registration("b@example.com")
        };
        assert!(matches!(
            register(&conn, &padded_short_name),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn duplicate_email_is_a_conflict() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        register(&conn, &registration("ada@example.com")).unwrap();
        let err = register(&conn, &registration("ADA@example.com")).unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn wrong_password_or_unknown_email_is_unauthorized() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        register(&conn, &registration("ada@example.com")).unwrap();
        assert!(matches!(
            authenticate(&conn, &credentials("ada@example.com", "babbage")),
            Err(AppError::Unauthorized)
        ));
        assert!(matches!(
            authenticate(&conn, &credentials("nobody@example.com", "engines")),
            Err(AppError::Unauthorized)
        ));
    }

    #[test]
    fn registration_bounds_are_enforced() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let short_name = Registration {
            full_name: "A".into(),
            ..registration("a@example.com")
        };
        assert!(matches!(register(&conn, &short_name), Err(AppError::Validation(_))));

        let bad_email = registration("not-an-email");
        assert!(matches!(register(&conn, &bad_email), Err(AppError::Validation(_))));

        let short_password = Registration {
            password: "123".into(),
            ..registration("b@example.com")
        };
        assert!(matches!(
            register(&conn, &short_password),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn remember_checkbox_values() {
        let mut creds = credentials("a@example.com", "secret1");
        assert!(!creds.remember());
        creds.remember = Some("on".into());
        assert!(creds.remember());
    }
}
