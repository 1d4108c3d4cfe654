use tracing::{debug, info};

use twtr_core::{new_id, now_rfc3339};
use twtr_sql::{SQLConn, Value};

use crate::model::{
    Credentials, ImageUpload, PasswordReset, ProfilePatch, Purpose, Registration, User, UserSummary,
};
use crate::service::mail;
use crate::service::repo::{self, UserDoc, UserRecord};
use crate::service::token::{dummy_hash, hash_password, verify_password};
use crate::service::toggle::{Relation, bump, memberships};
use crate::service::tweet::delete_cascade;
use crate::service::validate;
use crate::service::{SocialError, SocialService};

const SEARCH_LIMIT: i64 = 20;

/// Which profile image an upload replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageSlot {
    Avatar,
    Cover,
}

impl ImageSlot {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImageSlot::Avatar => "avatar",
            ImageSlot::Cover => "cover",
        }
    }

    fn namespace(&self) -> &'static str {
        match self {
            ImageSlot::Avatar => "avatars",
            ImageSlot::Cover => "covers",
        }
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_ascii_lowercase()
}

impl SocialService {
    /// Register a new, unconfirmed user and send the confirmation mail.
    pub fn register(&self, input: Registration) -> Result<(), SocialError> {
        let errors = validate::registration(&input);
        if !errors.is_empty() {
            return Err(SocialError::Validation(errors));
        }

        let now = now_rfc3339();
        let id = new_id();
        // Issue first so a missing secret leaves nothing behind.
        let token = self.issue_token(&id, Purpose::Confirm, None)?;
        let user = UserRecord {
            id,
            username: input.username.trim().to_string(),
            handle: input.handle.trim().to_string(),
            email: normalize_email(&input.email),
            password_hash: hash_password(&input.password)?,
            confirmed: false,
            followers: 0,
            doc: UserDoc::default(),
            created_at: now.clone(),
            updated_at: now,
        };

        self.in_transaction(|db| {
            let taken = repo::taken_fields(db, &user.username, &user.handle, &user.email, None)?;
            if !taken.is_empty() {
                return Err(SocialError::Conflict(taken));
            }
            repo::insert_user(db, &user)
        })?;
        info!("registered user {} (@{})", user.id, user.handle);

        self.dispatch(mail::confirmation(&self.config, &user.email, &token));
        Ok(())
    }

    fn send_confirmation(&self, user_id: &str, email: &str) -> Result<(), SocialError> {
        let token = self.issue_token(user_id, Purpose::Confirm, None)?;
        self.dispatch(mail::confirmation(&self.config, email, &token));
        Ok(())
    }

    /// Confirm an email address from a confirmation token.
    pub fn confirm(&self, token: &str) -> Result<(), SocialError> {
        let claims = self
            .verify_token(token, Purpose::Confirm)
            .map_err(|_| SocialError::invalid("token", "Confirmation link is invalid or expired"))?;
        self.mark_confirmed(&claims.sub)
    }

    pub(crate) fn mark_confirmed(&self, user_id: &str) -> Result<(), SocialError> {
        self.in_transaction(|db| {
            let mut user = repo::require_user(db, user_id)?;
            if !user.confirmed {
                user.confirmed = true;
                user.updated_at = now_rfc3339();
                repo::update_user(db, &user)?;
            }
            Ok(())
        })
    }

    /// Check credentials and issue an access token.
    pub fn login(&self, input: Credentials) -> Result<(String, User), SocialError> {
        let email = normalize_email(&input.email);
        let Some(user) = self.in_transaction(|db| repo::find_user_by_email(db, &email))? else {
            verify_password(&input.password, dummy_hash());
            return Err(SocialError::Unauthorized("invalid email or password".into()));
        };
        if !verify_password(&input.password, &user.password_hash) {
            return Err(SocialError::Unauthorized("invalid email or password".into()));
        }
        if !user.confirmed {
            return Err(SocialError::Forbidden("email address is not confirmed".into()));
        }

        let token = self.issue_token(&user.id, Purpose::Access, None)?;
        debug!("issued access token for {}", user.id);
        let id = user.id.clone();
        let view = self.in_transaction(|db| {
            repo::populate_user(db, repo::require_user(db, &id)?, &self.config.public_url)
        })?;
        Ok((token, view))
    }

    /// The actor's own profile.
    pub fn me(&self, user_id: &str) -> Result<User, SocialError> {
        self.in_transaction(|db| {
            repo::populate_user(db, repo::require_user(db, user_id)?, &self.config.public_url)
        })
    }

    /// Patch username, handle, email or website. Changing the email clears
    /// the confirmation flag and sends a new confirmation mail.
    pub fn update_profile(&self, user_id: &str, patch: ProfilePatch) -> Result<User, SocialError> {
        let errors = validate::profile(&patch);
        if !errors.is_empty() {
            return Err(SocialError::Validation(errors));
        }

        let (view, new_email) = self.in_transaction(|db| {
            let mut user = repo::require_user(db, user_id)?;
            let mut new_email = None;

            if let Some(username) = &patch.username {
                user.username = username.trim().to_string();
            }
            if let Some(handle) = &patch.handle {
                user.handle = handle.trim().to_string();
            }
            if let Some(email) = &patch.email {
                let email = normalize_email(email);
                if email != user.email {
                    user.email = email.clone();
                    user.confirmed = false;
                    new_email = Some(email);
                }
            }
            if let Some(website) = &patch.website {
                let website = website.trim();
                user.doc.website = (!website.is_empty()).then(|| website.to_string());
            }

            let taken =
                repo::taken_fields(db, &user.username, &user.handle, &user.email, Some(user_id))?;
            if !taken.is_empty() {
                return Err(SocialError::Conflict(taken));
            }

            user.updated_at = now_rfc3339();
            repo::update_user(db, &user)?;
            let view = repo::populate_user(db, user, &self.config.public_url)?;
            Ok((view, new_email))
        })?;

        if let Some(email) = new_email {
            info!("user {} changed email, confirmation required", user_id);
            self.send_confirmation(user_id, &email)?;
        }
        Ok(view)
    }

    /// Store a new avatar or cover image, replacing the previous one.
    pub fn set_profile_image(
        &self,
        user_id: &str,
        slot: ImageSlot,
        upload: ImageUpload,
    ) -> Result<User, SocialError> {
        let ext = twtr_blob::extension_for(&upload.content_type)
            .filter(|_| !upload.bytes.is_empty())
            .ok_or_else(|| SocialError::invalid(slot.as_str(), "Upload an image"))?;

        // Fail before touching storage when the account is gone.
        self.in_transaction(|db| repo::require_user(db, user_id).map(|_| ()))?;

        let key = twtr_blob::upload_key(slot.namespace(), ext);
        self.blob.put(&key, &upload.bytes)?;

        let result = self.in_transaction(|db| {
            let mut user = repo::require_user(db, user_id)?;
            let previous = match slot {
                ImageSlot::Avatar => user.doc.avatar.replace(key.clone()),
                ImageSlot::Cover => user.doc.cover.replace(key.clone()),
            };
            user.updated_at = now_rfc3339();
            repo::update_user(db, &user)?;
            Ok((repo::populate_user(db, user, &self.config.public_url)?, previous))
        });

        match result {
            Ok((view, previous)) => {
                self.discard_blobs(&previous.into_iter().collect::<Vec<_>>());
                Ok(view)
            }
            Err(e) => {
                self.discard_blobs(&[key]);
                Err(e)
            }
        }
    }

    /// Email a single-use reset link. Unknown addresses are silently ignored.
    pub fn request_password_reset(&self, email: &str) -> Result<(), SocialError> {
        let email = normalize_email(email);
        let Some(user) = self.in_transaction(|db| repo::find_user_by_email(db, &email))? else {
            debug!("password reset requested for unknown address");
            return Ok(());
        };
        let token = self.issue_token(&user.id, Purpose::Reset, Some(user.updated_at.clone()))?;
        self.dispatch(mail::password_reset(&self.config, &user.email, &token));
        Ok(())
    }

    /// Set a new password from a reset token.
    pub fn reset_password(&self, input: PasswordReset) -> Result<(), SocialError> {
        let mut errors = Vec::new();
        validate::password(&input.password, &mut errors);
        if !errors.is_empty() {
            return Err(SocialError::Validation(errors));
        }

        let invalid = || SocialError::invalid("token", "Reset link is invalid or expired");
        let claims = self
            .verify_token(&input.token, Purpose::Reset)
            .map_err(|_| invalid())?;
        let hash = hash_password(&input.password)?;

        self.in_transaction(|db| {
            let mut user = repo::require_user(db, &claims.sub)?;
            if claims.ver.as_deref() != Some(user.updated_at.as_str()) {
                return Err(invalid());
            }
            user.password_hash = hash.clone();
            user.updated_at = now_rfc3339();
            repo::update_user(db, &user)
        })?;
        info!("password reset for user {}", claims.sub);
        Ok(())
    }

    /// Delete the account with its tweets, memberships in both directions,
    /// counter contributions and stored files.
    pub fn delete_account(&self, user_id: &str) -> Result<(), SocialError> {
        let orphans = self.in_transaction(|db| {
            let user = repo::require_user(db, user_id)?;
            let mut orphans = Vec::new();

            for tweet_id in authored_tweets(db, user_id)? {
                // An earlier cascade may already have removed it.
                if let Some(tweet) = repo::find_tweet(db, &tweet_id)? {
                    delete_cascade(db, &tweet, &mut orphans)?;
                }
            }

            // Retweet and reply memberships went with the authored tweets.
            for relation in [Relation::Likes, Relation::Following] {
                for target in memberships(db, user_id, relation)? {
                    bump(db, relation, &target, -1)?;
                }
            }
            db.exec("DELETE FROM memberships WHERE user_id = ?1", &[user_id.into()])?;
            db.exec(
                "DELETE FROM memberships WHERE relation = ?1 AND target_id = ?2",
                &[Relation::Following.as_str().into(), user_id.into()],
            )?;
            db.exec("DELETE FROM users WHERE id = ?1", &[user_id.into()])?;

            orphans.extend(user.doc.avatar);
            orphans.extend(user.doc.cover);
            Ok(orphans)
        })?;

        self.discard_blobs(&orphans);
        info!("deleted user {}", user_id);
        Ok(())
    }

    /// Case-insensitive substring search on handles.
    pub fn search_users(&self, query: &str) -> Result<Vec<UserSummary>, SocialError> {
        let query = query.trim().to_lowercase();
        if query.is_empty() {
            return Ok(Vec::new());
        }
        self.in_transaction(|db| {
            let sql = format!(
                "SELECT {} FROM users WHERE instr(lower(handle), ?1) > 0 ORDER BY handle LIMIT ?2",
                repo::USER_COLUMNS
            );
            let rows = db.query(&sql, &[query.as_str().into(), Value::Integer(SEARCH_LIMIT)])?;
            let mut users = Vec::with_capacity(rows.len());
            for row in &rows {
                let id = row.get_str("id").unwrap_or_default();
                if let Some(summary) = repo::user_summary(db, id, &self.config.public_url)? {
                    users.push(summary);
                }
            }
            Ok(users)
        })
    }
}

fn authored_tweets(db: &dyn SQLConn, user_id: &str) -> Result<Vec<String>, SocialError> {
    let rows = db.query(
        "SELECT id FROM tweets WHERE user_id = ?1 ORDER BY seq",
        &[user_id.into()],
    )?;
    Ok(rows
        .iter()
        .filter_map(|r| r.get_str("id").map(str::to_string))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TweetInput;
    use crate::service::testing::fixture;

    fn registration(name: &str) -> Registration {
        Registration {
            username: name.to_string(),
            handle: name.to_string(),
            email: format!("{}@example.com", name),
            password: "correct horse battery".to_string(),
        }
    }

    fn token_from(link_text: &str, marker: &str) -> String {
        let start = link_text.find(marker).unwrap() + marker.len();
        link_text[start..].trim().to_string()
    }

    #[test]
    fn register_confirm_login() {
        let f = fixture();
        f.svc.register(registration("alice")).unwrap();

        let sent = f.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "alice@example.com");

        let creds = Credentials {
            email: "alice@example.com".into(),
            password: "correct horse battery".into(),
        };
        assert!(matches!(f.svc.login(creds.clone()), Err(SocialError::Forbidden(_))));

        let token = token_from(&sent[0].text, "/confirmation/");
        f.svc.confirm(&token).unwrap();

        let (access, user) = f.svc.login(creds).unwrap();
        assert!(!access.is_empty());
        assert!(user.confirmed);
        assert_eq!(f.svc.verify_token(&access, Purpose::Access).unwrap().sub, user.id);
    }

    #[test]
    fn login_rejects_bad_credentials() {
        let f = fixture();
        f.user("alice");
        let wrong = Credentials {
            email: "alice@example.com".into(),
            password: "wrong password".into(),
        };
        let wrong = match f.svc.login(wrong) {
            Err(SocialError::Unauthorized(message)) => message,
            other => panic!("unexpected {other:?}"),
        };
        let unknown = Credentials {
            email: "nobody@example.com".into(),
            password: "correct horse battery".into(),
        };
        let unknown = match f.svc.login(unknown) {
            Err(SocialError::Unauthorized(message)) => message,
            other => panic!("unexpected {other:?}"),
        };
        assert_eq!(wrong, unknown);
    }

    #[test]
    fn missing_secret_is_internal() {
        let dir = tempfile::tempdir().unwrap();
        let svc = SocialService::new(
            std::sync::Arc::new(twtr_sql::SqliteStore::open_in_memory().unwrap()),
            std::sync::Arc::new(twtr_blob::FileStore::open(dir.path()).unwrap()),
            std::sync::Arc::new(mail::LogMailer),
            crate::service::SocialConfig {
                jwt_secret: String::new(),
                ..Default::default()
            },
        )
        .unwrap();

        assert!(matches!(
            svc.register(registration("alice")),
            Err(SocialError::Internal(_))
        ));
        assert!(svc
            .in_transaction(|db| repo::find_user_by_email(db, "alice@example.com"))
            .unwrap()
            .is_none());

        let now = now_rfc3339();
        let user = UserRecord {
            id: new_id(),
            username: "bob".into(),
            handle: "bob".into(),
            email: "bob@example.com".into(),
            password_hash: hash_password("correct horse battery").unwrap(),
            confirmed: true,
            followers: 0,
            doc: UserDoc::default(),
            created_at: now.clone(),
            updated_at: now,
        };
        svc.in_transaction(|db| repo::insert_user(db, &user)).unwrap();
        let result = svc.login(Credentials {
            email: "bob@example.com".into(),
            password: "correct horse battery".into(),
        });
        assert!(matches!(result, Err(SocialError::Internal(_))));
    }

    #[test]
    fn duplicate_fields_conflict() {
        let f = fixture();
        f.svc.register(registration("alice")).unwrap();
        let err = f.svc.register(registration("alice")).unwrap_err();
        match err {
            SocialError::Conflict(fields) => {
                let names: Vec<_> = fields.iter().map(|f| f.name.as_str()).collect();
                assert_eq!(names, vec!["username", "handle", "email"]);
            }
            other => panic!("expected conflict, got {other:?}"),
        }
    }

    #[test]
    fn invalid_registration_is_rejected_before_storage() {
        let f = fixture();
        let err = f
            .svc
            .register(Registration {
                password: "short".into(),
                ..registration("alice")
            })
            .unwrap_err();
        assert!(matches!(err, SocialError::Validation(_)));
        assert!(f.mailer.sent().is_empty());
    }

    #[test]
    fn profile_patch_excludes_self_from_uniqueness() {
        let f = fixture();
        let alice = f.user("alice");
        f.user("bob");

        let user = f
            .svc
            .update_profile(
                &alice,
                ProfilePatch {
                    username: Some("alice".into()),
                    website: Some("https://alice.example.com".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(user.website.as_deref(), Some("https://alice.example.com"));

        let err = f
            .svc
            .update_profile(
                &alice,
                ProfilePatch {
                    handle: Some("bob".into()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, SocialError::Conflict(_)));
    }

    #[test]
    fn email_change_requires_reconfirmation() {
        let f = fixture();
        let alice = f.user("alice");
        let before = f.mailer.sent().len();

        let user = f
            .svc
            .update_profile(
                &alice,
                ProfilePatch {
                    email: Some("Alice@New.example.com".into()),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(user.email, "alice@new.example.com");
        assert!(!user.confirmed);
        assert_eq!(f.mailer.sent().len(), before + 1);
    }

    #[test]
    fn password_reset_is_single_use() {
        let f = fixture();
        f.user("alice");
        f.svc.request_password_reset("alice@example.com").unwrap();
        let mail = f.mailer.sent().pop().unwrap();
        assert_eq!(mail.subject, "Reset your password");
        let token = token_from(&mail.text, "/reset-password/");

        let reset = PasswordReset {
            token: token.clone(),
            password: "a brand new secret".into(),
        };
        f.svc.reset_password(reset.clone()).unwrap();
        assert!(matches!(f.svc.reset_password(reset), Err(SocialError::Validation(_))));

        f.svc
            .login(Credentials {
                email: "alice@example.com".into(),
                password: "a brand new secret".into(),
            })
            .unwrap();
    }

    #[test]
    fn reset_request_for_unknown_email_is_silent() {
        let f = fixture();
        f.svc.request_password_reset("ghost@example.com").unwrap();
        assert!(f.mailer.sent().is_empty());
    }

    #[test]
    fn avatar_replaces_previous_file() {
        let f = fixture();
        let alice = f.user("alice");
        let png = ImageUpload {
            content_type: "image/png".into(),
            bytes: vec![1, 2, 3],
        };

        let first = f.svc.set_profile_image(&alice, ImageSlot::Avatar, png.clone()).unwrap();
        let first_url = first.avatar.unwrap();
        let first_key = first_url.split("/uploads/").nth(1).unwrap().to_string();
        assert!(f.svc.blob.get(&first_key).unwrap().is_some());

        let second = f.svc.set_profile_image(&alice, ImageSlot::Avatar, png).unwrap();
        assert_ne!(second.avatar.unwrap(), first_url);
        assert!(f.svc.blob.get(&first_key).unwrap().is_none());
    }

    #[test]
    fn profile_image_must_be_an_image() {
        let f = fixture();
        let alice = f.user("alice");
        let err = f
            .svc
            .set_profile_image(
                &alice,
                ImageSlot::Cover,
                ImageUpload {
                    content_type: "text/plain".into(),
                    bytes: b"hi".to_vec(),
                },
            )
            .unwrap_err();
        match err {
            SocialError::Validation(fields) => assert_eq!(fields[0].name, "cover"),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[test]
    fn search_is_case_insensitive_substring() {
        let f = fixture();
        f.user("alice");
        f.user("malice");
        f.user("bob");
        let found = f.svc.search_users("ALI").unwrap();
        let handles: Vec<_> = found.iter().map(|u| u.handle.as_str()).collect();
        assert_eq!(handles, vec!["alice", "malice"]);
    }

    #[test]
    fn delete_account_cleans_up_everything() {
        let f = fixture();
        let alice = f.user("alice");
        let bob = f.user("bob");

        let bobs = f.tweet(&bob, "bob's tweet");
        let alices = f.tweet(&alice, "alice's tweet");
        f.svc.toggle(&alice, Relation::Likes, &bobs).unwrap();
        f.svc.toggle(&alice, Relation::Following, &bob).unwrap();
        f.svc.toggle(&bob, Relation::Following, &alice).unwrap();
        f.svc.toggle(&bob, Relation::Bookmarks, &alices).unwrap();
        f.svc
            .create_tweet(
                &alice,
                TweetInput {
                    retweet_id: Some(bobs.clone()),
                    ..Default::default()
                },
                None,
            )
            .unwrap();
        assert_eq!(f.svc.get_tweet(&bobs).unwrap().retweets, 1);

        f.svc.delete_account(&alice).unwrap();

        assert!(matches!(f.svc.me(&alice), Err(SocialError::NotFound(_))));
        let bob_view = f.svc.me(&bob).unwrap();
        assert_eq!(bob_view.followers, 0);
        assert!(bob_view.following.is_empty());
        assert!(bob_view.bookmarks.is_empty());
        let tweet = f.svc.get_tweet(&bobs).unwrap();
        assert_eq!((tweet.likes, tweet.retweets), (0, 0));
        assert!(matches!(f.svc.get_tweet(&alices), Err(SocialError::NotFound(_))));
    }
}
