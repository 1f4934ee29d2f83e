//! Provisions demo users, bearer tokens, and a group chat so the server is
//! usable without the external account service.

use clap::Parser;

use babbleon::db;
use babbleon::middleware::auth::{create_token_hash, generate_token};
use babbleon::models::user::CreateUser;

#[derive(Parser)]
#[command(name = "babble-seed", about = "Seed demo users and a chat")]
struct Args {
    /// Database to seed
    #[arg(long, default_value = "sqlite:babble.db?mode=rwc")]
    database_url: String,

    /// Usernames to create (each gets a bearer token printed to stdout)
    #[arg(long, value_delimiter = ',', default_value = "ana,ben,cleo")]
    users: Vec<String>,

    /// Name for the demo group chat created between all seeded users
    #[arg(long, default_value = "babble demo")]
    chat_name: String,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let pool = db::create_pool(&args.database_url)
        .await
        .expect("failed to open database");

    let mut user_ids = Vec::new();
    for username in &args.users {
        let user = db::users::create_user(
            &pool,
            &CreateUser {
                username: username.clone(),
                profile_icon: None,
            },
        )
        .await
        .expect("failed to create user");

        let token = generate_token();
        sqlx::query(
            "INSERT INTO user_tokens (token_hash, user_id, expires_at) \
             VALUES (?, ?, '2099-12-31T23:59:59')",
        )
        .bind(create_token_hash(&token))
        .bind(&user.id)
        .execute(&pool)
        .await
        .expect("failed to insert token");

        println!("{username}\t{}\tBearer {token}", user.id);
        user_ids.push(user.id);
    }

    if user_ids.len() >= 2 {
        let chat = db::chats::create_chat(&pool, &user_ids, Some(&args.chat_name))
            .await
            .expect("failed to create chat");
        println!("chat\t{}\tisGroup={}", chat.id, chat.is_group);
    }
}
