//! Walks one snack through its life: submitted, voted on, purchased.
//!
//! Reads `SNACK_DB_PATH` and `SNACK_ADMIN_EMAILS` from the environment or `.env`.
//! Run with `RUST_LOG=snack_request=debug` to see the library's events.
use snack_request::{
    auth::User,
    board::{AdminBoard, RequestBoard},
    config::Config,
    cycle::OrderMonth,
    request::{VoteDirection, format_net_score},
    service::SnackService,
};
use std::{sync::Arc, time::Duration};
use tracing_subscriber::EnvFilter;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| "snack_request=info".into()),
        )
        .init();

    let config = Config::from_env();
    let service = Arc::new(SnackService::from_config(&config)?);

    let user = User::new("user_demo", Some("someone@example.com"));
    let mut board = RequestBoard::open(service.clone(), user);
    board.refresh(Duration::ZERO);

    println!(
        "Requests made now are for {}",
        RequestBoard::requested_for(chrono::Utc::now()).label()
    );

    let Some(request) = board.submit("Spicy Chips", None) else {
        anyhow::bail!("submission failed, see the log");
    };
    board.vote(request.id(), VoteDirection::Up);
    board.vote(request.id(), VoteDirection::Up);
    board.vote(request.id(), VoteDirection::Down);
    board.refresh(Duration::from_secs(1));

    for request in board.requests() {
        println!(
            "{:<20} {:>4} {:>4} {:>5}  for {}  {}",
            request.name(),
            request.upvotes(),
            request.downvotes(),
            format_net_score(request.net_score()),
            request.order_month().label(),
            request.image_or(&config.placeholder_image_url),
        );
    }

    let Some(admin_email) = config.admins.emails().first() else {
        println!("No admins configured, skipping the purchase");
        return Ok(());
    };

    let admin = User::new("admin_demo", Some(admin_email.as_str()));
    let mut admin_board = AdminBoard::open_for(service.clone(), admin, request.order_month())?;
    admin_board.refresh(Duration::ZERO);

    match admin_board.purchase_one(request.id()) {
        Some(order) => println!(
            "Ordered {} item(s), net score {}",
            order.items.len(),
            format_net_score(order.total_net_score)
        ),
        None => println!("Purchase failed: {}", admin_board.error().unwrap_or("unknown")),
    }

    admin_board.refresh(Duration::from_secs(1));
    if let Some(message) = admin_board.empty_message() {
        println!("{message}");
    }
    println!(
        "{} order(s) on record, current month is {}",
        service.orders().list()?.len(),
        OrderMonth::current()
    );

    service.flush()
}
