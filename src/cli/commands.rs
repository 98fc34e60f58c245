#[cfg(test)]
#[path = "commands_test.rs"]
mod tests;

use std::io::Write;
use std::sync::Arc;

use clap::{Args, Subcommand};
use eyre::{Result, bail};

use super::console::{ChatConsole, read_or_interrupt};
use super::input::Input;
use crate::api::{ArcApi, is_unauthorized, new_client};
use crate::chat::ChatService;
use crate::config::{Configuration, verbose};
use crate::models::{
    AppType, Application, ApplicationPayload, LoginRequest, RegisterRequest,
    Role, User, UserCreate, UserUpdate,
};
use crate::storage::{ArcStore, ConversationBook, Credentials};

#[derive(Debug, Clone, Subcommand)]
pub enum Commands {
    /// Sign in and keep the access token
    Login {
        #[arg(short, long)]
        username: Option<String>,
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Create an account
    Register {
        #[arg(short, long)]
        username: String,
        #[arg(short, long)]
        email: String,
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Forget the access token and the cached user
    Logout,

    /// Show the signed-in user
    Whoami,

    /// Backend database setup
    #[command(subcommand)]
    Db(DbCommand),

    /// Manage workflow applications (admin)
    #[command(subcommand)]
    Apps(AppsCommand),

    /// Manage users (admin)
    #[command(subcommand)]
    Users(UsersCommand),

    /// Local conversations
    #[command(subcommand)]
    Conversations(ConversationsCommand),

    /// Chat in the current conversation. Reads messages from stdin when no
    /// message is given; Ctrl-C cancels the pending answer.
    Chat {
        /// Application to route the message to
        #[arg(short, long)]
        app: Option<i64>,

        message: Option<String>,
    },
}

#[derive(Debug, Clone, Subcommand)]
pub enum DbCommand {
    /// Show the initialization status
    Status,
    /// Create the tables and the admin account
    Init,
}

#[derive(Debug, Clone, Subcommand)]
pub enum AppsCommand {
    List,
    Create(AppArgs),
    Update {
        id: i64,
        #[command(flatten)]
        fields: AppUpdateArgs,
    },
    Delete {
        id: i64,
    },
}

#[derive(Debug, Clone, Args)]
pub struct AppArgs {
    #[arg(long)]
    pub name: String,
    /// workflow, chatflow, chatbot, agent or text_generator
    #[arg(long = "type", value_parser = parse_app_type)]
    pub app_type: AppType,
    #[arg(long)]
    pub url: String,
    #[arg(long)]
    pub key: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub inactive: bool,
}

#[derive(Debug, Clone, Default, Args)]
pub struct AppUpdateArgs {
    #[arg(long)]
    pub name: Option<String>,
    #[arg(long = "type", value_parser = parse_app_type)]
    pub app_type: Option<AppType>,
    #[arg(long)]
    pub url: Option<String>,
    #[arg(long)]
    pub key: Option<String>,
    #[arg(long)]
    pub description: Option<String>,
    #[arg(long)]
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum UsersCommand {
    List {
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long)]
        size: Option<u32>,
    },
    Get {
        id: i64,
    },
    Create {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long, default_value = "user", value_parser = parse_role)]
        role: Role,
        #[arg(long)]
        password: Option<String>,
    },
    Update {
        id: i64,
        #[arg(long)]
        username: Option<String>,
        #[arg(long)]
        email: Option<String>,
        #[arg(long, value_parser = parse_role)]
        role: Option<Role>,
        #[arg(long)]
        active: Option<bool>,
    },
    Delete {
        id: i64,
    },
}

#[derive(Debug, Clone, Subcommand)]
pub enum ConversationsCommand {
    List,
    New,
    Select { id: String },
}

impl Default for Commands {
    fn default() -> Self {
        Commands::Chat {
            app: None,
            message: None,
        }
    }
}

/// State shared by every command: the store and what lives in it.
pub struct Session {
    config: Configuration,
    credentials: Credentials,
    book: Arc<ConversationBook>,
    input: Input,
}

impl Session {
    pub fn new(config: Configuration, store: ArcStore) -> Self {
        Self {
            config,
            credentials: Credentials::new(store.clone()),
            book: Arc::new(ConversationBook::new(store)),
            input: Input::new(),
        }
    }

    pub async fn run(&mut self, command: Commands) -> Result<()> {
        match command {
            Commands::Login { username, password } => self.login(username, password).await,
            Commands::Register {
                username,
                email,
                password,
            } => self.register(username, email, password).await,
            Commands::Logout => {
                self.credentials.clear().await?;
                println!("Logged out");
                Ok(())
            }
            Commands::Whoami => {
                let user = self.current_user().await?;
                println!("{}", describe_user(&user));
                Ok(())
            }
            Commands::Db(cmd) => self.database(cmd).await,
            Commands::Apps(cmd) => self.apps(cmd).await,
            Commands::Users(cmd) => self.users(cmd).await,
            Commands::Conversations(cmd) => self.conversations(cmd).await,
            Commands::Chat { app, message } => self.chat(app, message).await,
        }
    }

    async fn api(&self) -> Result<ArcApi> {
        let token = self.credentials.token().await?;
        Ok(new_client(&self.config.api, token))
    }

    async fn signed_in_api(&self) -> Result<ArcApi> {
        let Some(token) = self.credentials.token().await? else {
            bail!("not logged in, run `ragchat login` first");
        };
        Ok(new_client(&self.config.api, Some(token)))
    }

    /// Drop the credentials when the backend rejected them.
    async fn check<T>(&self, res: Result<T>) -> Result<T> {
        match res {
            Err(err) if is_unauthorized(&err) => {
                log::warn!("credentials rejected: {:#}", err);
                self.credentials.clear().await?;
                bail!("session expired, run `ragchat login` again")
            }
            res => res,
        }
    }

    async fn current_user(&self) -> Result<User> {
        let api = self.signed_in_api().await?;
        let user = self.check(api.me().await).await?;
        self.credentials.cache_user(&user).await?;
        Ok(user)
    }

    async fn require_admin(&self) -> Result<ArcApi> {
        let user = self.current_user().await?;
        if !user.is_admin() {
            bail!("{} is not an administrator", user.username);
        }
        self.signed_in_api().await
    }

    async fn login(&mut self, username: Option<String>, password: Option<String>) -> Result<()> {
        let username = self.input.value_or_prompt(username, "Username: ").await?;
        let password = self.input.value_or_prompt(password, "Password: ").await?;
        let req = LoginRequest {
            username: username.trim().to_string(),
            password,
        };
        req.validate()?;

        let token = new_client(&self.config.api, None).login(req).await?;
        self.credentials.save_token(&token).await?;
        verbose!("[+] Token saved");

        let user = self.current_user().await?;
        println!("Logged in as {} ({})", user.username, user.role);
        Ok(())
    }

    async fn register(
        &mut self,
        username: String,
        email: String,
        password: Option<String>,
    ) -> Result<()> {
        let (password, confirm) = match password {
            Some(password) => (password.clone(), password),
            None => {
                let password = self.input.value_or_prompt(None, "Password: ").await?;
                let confirm = self
                    .input
                    .value_or_prompt(None, "Confirm password: ")
                    .await?;
                (password, confirm)
            }
        };

        let req = RegisterRequest {
            username: username.trim().to_string(),
            email: email.trim().to_string(),
            password,
        };
        req.validate(&confirm)?;

        let user = self.api().await?.register(req).await?;
        println!("Registered {}, run `ragchat login` to sign in", user.username);
        Ok(())
    }

    async fn database(&self, cmd: DbCommand) -> Result<()> {
        let api = self.api().await?;
        match cmd {
            DbCommand::Status => {
                let status = api.database_status().await?;
                println!("initialized:  {}", status.is_initialized);
                println!("connection:   {}", status.has_connection);
                println!("tables:       {}", status.has_tables);
                println!("admin user:   {}", status.has_admin_user);
                if !status.message.is_empty() {
                    println!("message:      {}", status.message);
                }
                println!("next step:    {}", status.current_step());
            }
            DbCommand::Init => {
                let res = api.initialize_database().await?;
                if !res.success {
                    bail!("initialization failed: {}", res.message);
                }
                println!("{}", res.message);
                if let (Some(username), Some(password)) = (res.admin_username, res.admin_password)
                {
                    println!("admin username: {}", username);
                    println!("admin password: {}", password);
                }
            }
        }
        Ok(())
    }

    async fn apps(&self, cmd: AppsCommand) -> Result<()> {
        let api = self.require_admin().await?;
        match cmd {
            AppsCommand::List => {
                let apps = self.check(api.list_apps().await).await?;
                if apps.is_empty() {
                    println!("No applications");
                }
                for app in apps {
                    println!("{}", app);
                }
            }
            AppsCommand::Create(args) => {
                let payload = args.into_payload();
                payload.validate()?;
                let app = self.check(api.create_app(payload).await).await?;
                println!("Created {}", app);
            }
            AppsCommand::Update { id, fields } => {
                let apps = self.check(api.list_apps().await).await?;
                let Some(current) = apps.iter().find(|app| app.id == id) else {
                    bail!("application {} not found", id);
                };
                let payload = fields.apply(current);
                payload.validate()?;
                let app = self.check(api.update_app(id, payload).await).await?;
                println!("Updated {}", app);
            }
            AppsCommand::Delete { id } => {
                self.check(api.delete_app(id).await).await?;
                println!("Deleted application {}", id);
            }
        }
        Ok(())
    }

    async fn users(&mut self, cmd: UsersCommand) -> Result<()> {
        let api = self.require_admin().await?;
        match cmd {
            UsersCommand::List { page, size } => {
                let size = size.unwrap_or(self.config.chat.page_size);
                let list = self.check(api.list_users(page.max(1), size).await).await?;
                for user in &list.users {
                    println!("{}", describe_user(user));
                }
                println!(
                    "page {} ({} per page), {} users total",
                    list.page, list.size, list.total
                );
            }
            UsersCommand::Get { id } => {
                let user = self.check(api.get_user(id).await).await?;
                println!("{}", describe_user(&user));
            }
            UsersCommand::Create {
                username,
                email,
                role,
                password,
            } => {
                let password = self.input.value_or_prompt(password, "Password: ").await?;
                let req = UserCreate {
                    username: username.trim().to_string(),
                    email: email.trim().to_string(),
                    password,
                    role,
                };
                req.validate()?;
                let user = self.check(api.create_user(req).await).await?;
                println!("Created {}", describe_user(&user));
            }
            UsersCommand::Update {
                id,
                username,
                email,
                role,
                active,
            } => {
                let req = UserUpdate {
                    username,
                    email,
                    role,
                    is_active: active,
                };
                req.validate()?;
                let user = self.check(api.update_user(id, req).await).await?;
                println!("Updated {}", describe_user(&user));
            }
            UsersCommand::Delete { id } => {
                self.check(api.delete_user(id).await).await?;
                println!("Deleted user {}", id);
            }
        }
        Ok(())
    }

    async fn conversations(&self, cmd: ConversationsCommand) -> Result<()> {
        match cmd {
            ConversationsCommand::List => {
                let current = self.book.current().await?;
                for conversation in self.book.list().await? {
                    let marker = if conversation.id() == current.id() {
                        "*"
                    } else {
                        " "
                    };
                    println!(
                        "{} {:>3}  {}  ({} messages)",
                        marker,
                        conversation.id(),
                        conversation.title(),
                        conversation.len()
                    );
                }
            }
            ConversationsCommand::New => {
                let conversation = self.book.new_conversation().await?;
                println!("Switched to {}", conversation.title());
            }
            ConversationsCommand::Select { id } => {
                let conversation = self.book.select(&id).await?;
                println!("Switched to {}", conversation.title());
            }
        }
        Ok(())
    }

    async fn chat(&mut self, app: Option<i64>, message: Option<String>) -> Result<()> {
        let api = self.signed_in_api().await?;
        let app_id = self.pick_app(&api, app).await?;
        let service = ChatService::new(api, Arc::clone(&self.book));
        let mut console = ChatConsole::new(service, app_id, std::io::stdout());

        match message {
            Some(message) => self.chat_once(&mut console, &message).await,
            None => self.chat_interactive(&mut console).await,
        }
    }

    async fn chat_interactive<W: Write>(&mut self, console: &mut ChatConsole<W>) -> Result<()> {
        let conversation = self.book.current().await?;
        println!(
            "Chatting in \"{}\" with application {}. Empty line, end of input or Ctrl-C quits.",
            conversation.title(),
            console.app_id()
        );

        loop {
            let read = self.input.read_line("> ");
            let Some(line) = read_or_interrupt(read, tokio::signal::ctrl_c()).await? else {
                println!();
                return Ok(());
            };
            if line.trim().is_empty() {
                return Ok(());
            }
            self.chat_once(console, &line).await?;
        }
    }

    async fn chat_once<W: Write>(&self, console: &mut ChatConsole<W>, message: &str) -> Result<()> {
        let conversation = self.book.current().await?;
        let res = console
            .send(conversation.id(), message, tokio::signal::ctrl_c())
            .await;
        let outcome = self.check(res).await?;
        log::debug!("turn finished as {}", outcome.state);
        Ok(())
    }

    async fn pick_app(&self, api: &ArcApi, app: Option<i64>) -> Result<i64> {
        if let Some(id) = app.or(self.config.chat.default_app) {
            return Ok(id);
        }
        let apps = self.check(api.list_apps().await).await?;
        match first_active(&apps) {
            Some(app) => {
                verbose!("[+] Using application {}", app);
                Ok(app.id)
            }
            None => bail!("no active application, pass --app or set chat.default_app"),
        }
    }
}

impl AppArgs {
    fn into_payload(self) -> ApplicationPayload {
        ApplicationPayload {
            name: self.name.trim().to_string(),
            app_type: self.app_type,
            api_url: self.url.trim().to_string(),
            api_key: self.key,
            description: self.description,
            is_active: !self.inactive,
        }
    }
}

impl AppUpdateArgs {
    /// Overlay the given fields on the stored application.
    fn apply(self, app: &Application) -> ApplicationPayload {
        let mut payload = ApplicationPayload::from_application(app);
        if let Some(name) = self.name {
            payload.name = name.trim().to_string();
        }
        if let Some(app_type) = self.app_type {
            payload.app_type = app_type;
        }
        if let Some(url) = self.url {
            payload.api_url = url.trim().to_string();
        }
        if let Some(key) = self.key {
            payload.api_key = Some(key);
        }
        if let Some(description) = self.description {
            payload.description = Some(description);
        }
        if let Some(active) = self.active {
            payload.is_active = active;
        }
        payload
    }
}

fn first_active(apps: &[Application]) -> Option<&Application> {
    apps.iter().find(|app| app.is_active)
}

fn describe_user(user: &User) -> String {
    format!(
        "{:>4}  {}  <{}>  {}{}",
        user.id,
        user.username,
        user.email,
        user.role,
        if user.is_active { "" } else { "  (inactive)" }
    )
}

fn parse_app_type(s: &str) -> Result<AppType, String> {
    s.parse::<AppType>().map_err(|e| e.to_string())
}

fn parse_role(s: &str) -> Result<Role, String> {
    s.parse::<Role>().map_err(|e| e.to_string())
}
