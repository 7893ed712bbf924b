//! Subcommand handlers
//!
//! Handlers write their output to any [`Write`] so they can run against a
//! buffer in tests.

use std::{io::Write, sync::Arc};

use clap::Subcommand;
use store::{
    RecordStore,
    identity::{Identity, IdentityResolver},
    models::{FeedEntry, NewNotification, NewPost, NewUser, Notification},
    session::{Session, SessionStore},
    validation,
};
use thiserror::Error;
use tracing::info;

/// Failure the user can act on; anything else is reported generically
#[derive(Debug, Error)]
pub enum Rejected {
    #[error("{0}")]
    Invalid(String),
    #[error("Invalid username/email or password")]
    BadCredentials,
    #[error("Username is already taken")]
    UsernameTaken,
    #[error("You need to log in first")]
    NotLoggedIn,
    #[error("No such {0}")]
    Missing(&'static str),
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Create an account
    Signup {
        username: String,
        email: String,
        password: String,
        /// Password confirmation
        confirm: String,
    },
    /// Log in with a username or email
    Login { identifier: String, password: String },
    /// Forget the current session
    Logout,
    /// Show the acting user
    Whoami,
    /// Publish a photo post
    Publish {
        /// Stored photo file name or bundled asset id
        image: String,
        #[arg(short, long)]
        location: Option<String>,
        /// Resolved address; defaults to the location
        #[arg(short, long)]
        address: Option<String>,
    },
    /// List posts, newest first
    Feed,
    /// Like or unlike a post
    Like { post_id: i64 },
    /// Delete a post and its likes
    Delete { post_id: i64 },
    /// List notifications for the acting user
    Notifications {
        /// Include every recipient
        #[arg(long)]
        all: bool,
    },
    /// Mark a notification as read
    Read { notification_id: i64 },
    /// Record a notification for a user
    Notify {
        recipient_user_id: i64,
        actor_name: String,
        action_text: String,
        #[arg(short, long)]
        location: Option<String>,
        #[arg(long)]
        profile_image: Option<String>,
    },
    /// Check that the backend is reachable
    Health,
}

/// Collaborators shared by every handler
pub struct Context {
    pub store: Arc<dyn RecordStore>,
    pub sessions: SessionStore,
    pub identity: IdentityResolver,
}

impl Context {
    async fn current_user(&self) -> anyhow::Result<Identity> {
        let session = self.sessions.load().await;
        self.identity
            .current_user_id(&session, self.store.as_ref())
            .await?
            .ok_or_else(|| Rejected::NotLoggedIn.into())
    }

    /// Acting user for read-only views; nobody logged in means anonymous
    async fn viewer(&self) -> anyhow::Result<Option<i64>> {
        anonymous_when_logged_out(self.current_user().await)
    }
}

fn anonymous_when_logged_out(identity: anyhow::Result<Identity>) -> anyhow::Result<Option<i64>> {
    match identity {
        Ok(identity) => Ok(Some(identity.user_id())),
        Err(e) if matches!(e.downcast_ref::<Rejected>(), Some(Rejected::NotLoggedIn)) => Ok(None),
        Err(e) => Err(e),
    }
}

pub async fn run(command: Command, ctx: &Context, out: &mut impl Write) -> anyhow::Result<()> {
    match command {
        Command::Signup {
            username,
            email,
            password,
            confirm,
        } => signup(ctx, out, &username, &email, &password, &confirm).await,
        Command::Login {
            identifier,
            password,
        } => login(ctx, out, &identifier, &password).await,
        Command::Logout => {
            ctx.sessions.clear().await?;
            writeln!(out, "Logged out")?;
            Ok(())
        }
        Command::Whoami => whoami(ctx, out).await,
        Command::Publish {
            image,
            location,
            address,
        } => {
            let identity = ctx.current_user().await?;
            let mut new_post = NewPost::new(identity.user_id()).with_image(image);
            new_post.location = location;
            new_post.location_address = address;

            let id = ctx.store.create_post(&new_post).await?;
            writeln!(out, "Published post {}", id)?;
            Ok(())
        }
        Command::Feed => {
            let viewer = ctx.viewer().await?;
            for entry in ctx.store.get_feed(viewer).await? {
                writeln!(out, "{}", feed_line(&entry))?;
            }
            Ok(())
        }
        Command::Like { post_id } => {
            let identity = ctx.current_user().await?;
            let liked = ctx.store.toggle_like(post_id, identity.user_id()).await?;
            let count = ctx.store.get_like_count(post_id).await?;
            let verb = if liked { "Liked" } else { "Unliked" };
            writeln!(out, "{} post {} ({} likes)", verb, post_id, count)?;
            Ok(())
        }
        Command::Delete { post_id } => {
            ctx.current_user().await?;
            if ctx.store.delete_post(post_id).await? == 0 {
                return Err(Rejected::Missing("post").into());
            }
            writeln!(out, "Deleted post {}", post_id)?;
            Ok(())
        }
        Command::Notifications { all } => {
            let recipient = if all {
                None
            } else {
                Some(ctx.current_user().await?.user_id())
            };
            for notification in ctx.store.get_all_notifications(recipient).await? {
                writeln!(out, "{}", notification_line(&notification))?;
            }
            Ok(())
        }
        Command::Read { notification_id } => {
            if ctx.store.mark_notification_as_read(notification_id).await? == 0 {
                return Err(Rejected::Missing("notification").into());
            }
            writeln!(out, "Marked notification {} as read", notification_id)?;
            Ok(())
        }
        Command::Notify {
            recipient_user_id,
            actor_name,
            action_text,
            location,
            profile_image,
        } => {
            let id = ctx
                .store
                .create_notification(&NewNotification {
                    recipient_user_id,
                    actor_name,
                    action_text,
                    location,
                    profile_image,
                })
                .await?;
            writeln!(out, "Created notification {}", id)?;
            Ok(())
        }
        Command::Health => {
            let healthy = ctx.store.health_check().await?;
            writeln!(out, "{}", if healthy { "ok" } else { "unreachable" })?;
            Ok(())
        }
    }
}

async fn signup(
    ctx: &Context,
    out: &mut impl Write,
    username: &str,
    email: &str,
    password: &str,
    confirm: &str,
) -> anyhow::Result<()> {
    validation::validate_signup(username, email, password, confirm).map_err(Rejected::Invalid)?;

    let username = username.trim();
    if ctx.store.user_exists(username).await? {
        return Err(Rejected::UsernameTaken.into());
    }

    let id = ctx
        .store
        .create_user(&NewUser::new(username, email.trim(), password))
        .await?;
    info!("Signed up user {}", id);
    writeln!(out, "Account created for {}", username)?;
    Ok(())
}

async fn login(
    ctx: &Context,
    out: &mut impl Write,
    identifier: &str,
    password: &str,
) -> anyhow::Result<()> {
    let user = ctx
        .store
        .authenticate(identifier.trim(), password)
        .await?
        .ok_or(Rejected::BadCredentials)?;

    ctx.sessions.save(&Session::logged_in(&user)).await?;
    writeln!(out, "Logged in as {}", user.username)?;
    Ok(())
}

async fn whoami(ctx: &Context, out: &mut impl Write) -> anyhow::Result<()> {
    let identity = ctx.current_user().await?;
    let name = ctx
        .store
        .get_user(identity.user_id())
        .await?
        .map(|user| user.username)
        .unwrap_or_else(|| "unknown user".to_string());

    match identity {
        Identity::Session(id) => writeln!(out, "{} (id {})", name, id)?,
        Identity::DevFallback(id) => writeln!(out, "{} (id {}, not logged in)", name, id)?,
    }
    Ok(())
}

fn feed_line(entry: &FeedEntry) -> String {
    let post = &entry.post;
    let place = post
        .location_address
        .as_deref()
        .or(post.location.as_deref())
        .unwrap_or("-");
    let heart = if entry.liked_by_viewer { "♥" } else { "♡" };

    format!(
        "#{} @{} {} [{}] {} {} {}",
        post.id,
        post.username,
        post.image_ref.as_deref().unwrap_or("-"),
        place,
        post.display_created_at(),
        heart,
        entry.like_count
    )
}

fn notification_line(notification: &Notification) -> String {
    let mut line = format!(
        "{} {} {}",
        if notification.is_read { " " } else { "*" },
        notification.actor_name,
        notification.action_text
    );
    if let Some(location) = &notification.location {
        line.push_str(&format!(" · {}", location));
    }
    line.push_str(&format!(" ({}) [{}]", notification.time_ago, notification.id));
    line
}
