use std::io::BufRead as _;
use std::sync::Arc;

use anyhow::Context as _;

use crate::account::{Account, ProfileUpdate};
use crate::admin::AdminUsers;
use crate::api::Api;
use crate::bookmarks::{BookmarkService, BookmarkToggle, HttpBookmarks};
use crate::catalog::{ContentDraft, ContentFilter, ContentPatch, ContentService, HttpCatalog};
use crate::cli::{
    AdminCommand, AdminCreateArgs, AdminUpdateArgs, AdminUsersCommand, BrowseArgs, BuyArgs,
    Command, LoginArgs, ProfileCommand, ProgressArgs, ReadArgs, RegisterArgs,
};
use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::model::{ContentRecord, Identity};
use crate::payment::{FlowError, HttpPayments, PaymentService};
use crate::reader::{FontSize, Reader, ReaderView, format_price};
use crate::session::{Session, SessionService};
use crate::token_store::{FileTokenStore, MemoryTokenStore, TokenStore};
use crate::transport::Transport;

/// Everything a subcommand needs, wired once per process.
pub struct App {
    pub config: ClientConfig,
    pub session: Arc<Session>,
    pub api: Api,
}

impl App {
    pub async fn connect(config: ClientConfig) -> anyhow::Result<Self> {
        let transport = Transport::new(&config)?;
        let store: Arc<dyn TokenStore> = match &config.token_file {
            Some(path) => Arc::new(FileTokenStore::new(path)),
            None => Arc::new(MemoryTokenStore::new()),
        };
        let session = Arc::new(
            Session::rehydrate(transport.clone(), store)
                .await
                .context("restore session")?,
        );
        let api = Api::new(transport, session.clone());
        Ok(Self {
            config,
            session,
            api,
        })
    }

    fn catalog(&self) -> Arc<HttpCatalog> {
        Arc::new(HttpCatalog::new(self.api.clone()))
    }

    fn require_identity(&self) -> anyhow::Result<Identity> {
        self.require_session()?;
        self.session
            .identity()
            .ok_or_else(|| anyhow::anyhow!("could not verify the saved session; try again"))
    }

    /// A token is enough for calls that do not show who is signed in; the
    /// identity may be unknown when the server was unreachable at startup.
    fn require_session(&self) -> anyhow::Result<()> {
        if self.session.token().is_none() {
            anyhow::bail!("not logged in; run `paywall-reader login` first");
        }
        Ok(())
    }
}

pub async fn run(app: &App, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Login(args) => login(app, args).await,
        Command::Register(args) => register(app, args).await,
        Command::Logout => {
            app.session.logout().await.context("clear session")?;
            println!("Logged out.");
            Ok(())
        }
        Command::Whoami => {
            let identity = app.require_identity()?;
            print_identity(&identity);
            Ok(())
        }
        Command::Browse(args) => browse(app, args).await,
        Command::Read(args) => read(app, args).await,
        Command::Buy(args) => buy(app, args).await,
        Command::Bookmark(args) => {
            app.require_session()?;
            let service: Arc<dyn BookmarkService> = Arc::new(HttpBookmarks::new(app.api.clone()));
            let mut toggle = BookmarkToggle::check(service, args.id)
                .await
                .context("check bookmark")?;
            let bookmarked = toggle.toggle().await.context("toggle bookmark")?;
            if bookmarked {
                println!("Bookmarked #{}.", args.id);
            } else {
                println!("Removed bookmark #{}.", args.id);
            }
            Ok(())
        }
        Command::Bookmarks => {
            app.require_session()?;
            let bookmarks = HttpBookmarks::new(app.api.clone())
                .list()
                .await
                .context("list bookmarks")?;
            if bookmarks.is_empty() {
                println!("No bookmarks yet.");
            }
            for bookmark in bookmarks {
                println!(
                    "#{} {}",
                    bookmark.content_id,
                    bookmark.title.as_deref().unwrap_or("(untitled)")
                );
            }
            Ok(())
        }
        Command::Dashboard => dashboard(app).await,
        Command::Payments => {
            app.require_session()?;
            let payments = HttpPayments::new(app.api.clone())
                .history()
                .await
                .context("load payment history")?;
            if payments.is_empty() {
                println!("No payments yet.");
            }
            for payment in payments {
                println!(
                    "{} {} {} {}",
                    payment.transaction_id.as_deref().unwrap_or("-"),
                    payment
                        .content_title
                        .as_deref()
                        .unwrap_or("(deleted content)"),
                    format_price(payment.amount),
                    payment.status
                );
            }
            Ok(())
        }
        Command::Progress(args) => progress(app, args).await,
        Command::Profile { command } => profile(app, command).await,
        Command::Admin { command } => admin(app, command).await,
    }
}

async fn login(app: &App, args: LoginArgs) -> anyhow::Result<()> {
    let identity = app
        .session
        .login(&args.email, &args.password)
        .await
        .context("login")?;
    println!("Logged in as {} <{}>.", identity.name, identity.email);
    Ok(())
}

async fn register(app: &App, args: RegisterArgs) -> anyhow::Result<()> {
    let identity = app
        .session
        .register(&args.name, &args.email, &args.password)
        .await
        .context("register")?;
    println!("Welcome, {}!", identity.name);
    Ok(())
}

async fn browse(app: &App, args: BrowseArgs) -> anyhow::Result<()> {
    let filter = ContentFilter {
        category: args.category,
        search: args.search,
        featured: args.featured,
    };
    let items = app
        .catalog()
        .list(&filter)
        .await
        .context("list content")?;
    if items.is_empty() {
        println!("No content found.");
    }
    for item in &items {
        print_summary(item);
    }
    Ok(())
}

async fn read(app: &App, args: ReadArgs) -> anyhow::Result<()> {
    let mut reader = Reader::new(app.catalog(), app.session.clone(), args.id);
    reader.set_font_size(FontSize::new(args.font_size));
    reader
        .load()
        .await
        .with_context(|| format!("load content #{}", args.id))?;
    print_reader(&reader);
    Ok(())
}

async fn buy(app: &App, args: BuyArgs) -> anyhow::Result<()> {
    app.require_session()?;

    let mut reader = Reader::new(app.catalog(), app.session.clone(), args.id);
    let record = reader
        .load()
        .await
        .with_context(|| format!("load content #{}", args.id))?;
    if record.has_access {
        println!("You already have access to \"{}\".", record.title);
        print_reader(&reader);
        return Ok(());
    }
    eprintln!("{} - {}", record.title, format_price(record.price));

    let payments: Arc<dyn PaymentService> = Arc::new(HttpPayments::new(app.api.clone()));
    let mut flow = reader.start_purchase(payments, app.config.unlock_delay)?;

    flow.initiate(&args.phone)
        .await
        .context("initiate payment")?;
    if app.config.show_otp_hint
        && let Some(hint) = flow.otp_hint()
    {
        eprintln!("{hint}");
    }

    let completion = match args.otp {
        Some(otp) => flow.confirm(&otp).await.context("confirm payment")?,
        None => loop {
            let Some(otp) = prompt_line("Enter the 6-digit confirmation code: ").await? else {
                if let Some(payment_id) = flow.abandon() {
                    anyhow::bail!("payment {payment_id} abandoned before confirmation");
                }
                anyhow::bail!("payment abandoned");
            };
            match flow.confirm(&otp).await {
                Ok(completion) => break completion,
                Err(FlowError::Api(err)) if err.ends_session() => {
                    return Err(err).context("confirm payment");
                }
                Err(FlowError::Api(ApiError::Transport { detail })) => {
                    eprintln!("Request failed ({detail}); try again.");
                }
                Err(err) => eprintln!("{}", err.user_message()),
            }
        },
    };

    eprintln!("Payment confirmed! Opening your content...");
    reader
        .on_payment_succeeded(&completion)
        .await
        .context("reload content after payment")?;
    print_reader(&reader);
    Ok(())
}

async fn prompt_line(prompt: &str) -> anyhow::Result<Option<String>> {
    eprint!("{prompt}");
    tokio::task::spawn_blocking(|| {
        let mut line = String::new();
        let read = std::io::stdin()
            .lock()
            .read_line(&mut line)
            .context("read stdin")?;
        if read == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_owned()))
    })
    .await
    .context("join stdin reader")?
}

async fn dashboard(app: &App) -> anyhow::Result<()> {
    let identity = app.require_identity()?;
    let dashboard = Account::new(app.api.clone())
        .dashboard()
        .await
        .context("load dashboard")?;
    println!("{}", identity.name);
    println!(
        "Purchased: {}  Bookmarks: {}  Spent: {}",
        dashboard.total_purchased,
        dashboard.bookmarks_count,
        format_price(dashboard.total_spent)
    );
    for item in dashboard.purchased_content {
        let progress = item
            .progress_percent
            .map(|p| format!("{p:.0}%"))
            .unwrap_or_else(|| "not started".to_owned());
        println!("#{} {} ({progress})", item.id, item.title);
    }
    Ok(())
}

async fn progress(app: &App, args: ProgressArgs) -> anyhow::Result<()> {
    app.require_session()?;
    let account = Account::new(app.api.clone());
    if let Some(percent) = args.percent {
        account
            .record_progress(args.id, percent, args.last_page)
            .await
            .context("save reading progress")?;
        println!("Saved progress for #{}.", args.id);
        return Ok(());
    }
    match account.progress(args.id).await.context("load reading progress")? {
        Some(progress) => println!(
            "#{}: {:.0}% (page {})",
            progress.content_id, progress.progress_percent, progress.last_page
        ),
        None => println!("#{}: not started", args.id),
    }
    Ok(())
}

async fn profile(app: &App, command: ProfileCommand) -> anyhow::Result<()> {
    app.require_session()?;
    let account = Account::new(app.api.clone());
    let identity = match command {
        ProfileCommand::Update(args) => {
            account
                .update_profile(&ProfileUpdate {
                    name: args.name,
                    current_password: args.current_password,
                    new_password: args.new_password,
                })
                .await?
        }
        ProfileCommand::Avatar(args) => account.upload_avatar(&args.file).await?,
    };
    print_identity(&identity);
    Ok(())
}

async fn admin(app: &App, command: AdminCommand) -> anyhow::Result<()> {
    let catalog = app.catalog();
    match command {
        AdminCommand::Create(args) => {
            let record = catalog
                .create(&draft_from(args))
                .await
                .context("create content")?;
            print_summary(&record);
        }
        AdminCommand::Update(args) => {
            let id = args.id;
            let record = catalog
                .update(id, &patch_from(args))
                .await
                .with_context(|| format!("update content #{id}"))?;
            print_summary(&record);
        }
        AdminCommand::Delete(args) => {
            catalog
                .delete(args.id)
                .await
                .with_context(|| format!("delete content #{}", args.id))?;
            println!("Deleted #{}.", args.id);
        }
        AdminCommand::Users { command } => admin_users(app, command).await?,
        AdminCommand::Stats => {
            let stats = AdminUsers::new(app.api.clone())
                .stats()
                .await
                .context("load admin stats")?;
            println!(
                "Users: {}  Content: {}  Payments: {}  Revenue: {}",
                stats.total_users,
                stats.total_content,
                stats.total_payments,
                format_price(stats.total_revenue)
            );
            for payment in stats.recent_payments {
                println!(
                    "{} {} {} {}",
                    payment.transaction_id.as_deref().unwrap_or("-"),
                    payment.user_name.as_deref().unwrap_or("(deleted user)"),
                    payment
                        .content_title
                        .as_deref()
                        .unwrap_or("(deleted content)"),
                    format_price(payment.amount)
                );
            }
        }
    }
    Ok(())
}

async fn admin_users(app: &App, command: AdminUsersCommand) -> anyhow::Result<()> {
    let users = AdminUsers::new(app.api.clone());
    match command {
        AdminUsersCommand::List => {
            for user in users.list().await.context("list users")? {
                print!("#{} ", user.id);
                print_identity(&user);
            }
        }
        AdminUsersCommand::Role(args) => {
            let user = users
                .update_role(args.id, args.role)
                .await
                .with_context(|| format!("update user #{}", args.id))?;
            print_identity(&user);
        }
        AdminUsersCommand::Delete(args) => {
            users
                .delete(args.id)
                .await
                .with_context(|| format!("delete user #{}", args.id))?;
            println!("Deleted user #{}.", args.id);
        }
    }
    Ok(())
}

fn draft_from(args: AdminCreateArgs) -> ContentDraft {
    ContentDraft {
        title: args.title,
        author: args.author,
        category: args.category,
        description: args.description,
        preview_text: args.preview_text,
        full_text: args.full_text,
        price: args.price,
        is_featured: args.featured,
        cover_image: args.cover,
        pdf_file: args.pdf,
    }
}

fn patch_from(args: AdminUpdateArgs) -> ContentPatch {
    ContentPatch {
        title: args.title,
        author: args.author,
        category: args.category,
        description: args.description,
        preview_text: args.preview_text,
        full_text: args.full_text,
        price: args.price,
        is_featured: args.featured,
        cover_image: args.cover,
        pdf_file: args.pdf,
    }
}

fn print_identity(identity: &Identity) {
    let role = if identity.is_admin() { "admin" } else { "user" };
    println!("{} <{}> ({role})", identity.name, identity.email);
}

fn print_summary(item: &ContentRecord) {
    let access = if item.has_access { " [owned]" } else { "" };
    println!(
        "#{} [{}] {} by {} - {}{access}",
        item.id,
        item.category,
        item.title,
        if item.author.is_empty() {
            "Unknown"
        } else {
            item.author.as_str()
        },
        format_price(item.price)
    );
}

fn print_reader(reader: &Reader) {
    let Some(view) = reader.view() else {
        return;
    };
    match view {
        ReaderView::FullText {
            title,
            paragraphs,
            font_size,
        } => {
            println!("{title}");
            println!("(font size {})", font_size.get());
            for paragraph in paragraphs {
                println!();
                println!("{paragraph}");
            }
        }
        ReaderView::Paywall {
            title,
            preview,
            call_to_action,
            ..
        } => {
            println!("{title}");
            println!("Preview");
            for paragraph in preview {
                println!();
                println!("{paragraph}");
            }
            println!();
            println!("Continue reading: {call_to_action}");
        }
    }
}
