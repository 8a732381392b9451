use std::{process, sync::Arc};

use albumsync::{
    application::{
        auth::{AuthProvider, StaticAuth},
        error::AppError,
        fetcher::{AlbumsState, AlbumsStore},
        mutation::SubmitOutcome,
        notifier::{BroadcastNotifier, NotificationEvent},
        session::{DashboardSession, ListView, SessionOptions},
    },
    cache::CacheConfig,
    config,
    infra::{http::HttpAlbumsApi, telemetry},
};
use tokio::{runtime::Handle, sync::broadcast};
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

mod print;

use print::{CreateReport, NoticeView, RowView, print_json};

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(1);
    }
}

fn report_application_error(error: &AppError) {
    if dispatcher::has_been_set() {
        error!(error = %error, "application error");
        return;
    }

    let subscriber = tracing_fmt()
        .with_writer(std::io::stderr)
        .with_max_level(Level::ERROR)
        .finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(error = %error, "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    telemetry::init(&settings.logging)?;

    let session = open_session(&settings)?;
    match cli_args.command {
        config::Command::List => run_list(&session).await,
        config::Command::Create(args) => run_create(&session, &args.title).await,
    }
}

fn open_session(settings: &config::Settings) -> Result<DashboardSession, AppError> {
    let api = Arc::new(HttpAlbumsApi::new(&settings.api)?);
    let auth: Arc<dyn AuthProvider> = match settings.session.user_id.as_deref() {
        Some(user_id) => Arc::new(StaticAuth::signed_in(user_id)),
        None => Arc::new(StaticAuth::anonymous()),
    };
    let store = AlbumsStore::new(CacheConfig::from(&settings.cache), Handle::current());
    let notifier = Arc::new(BroadcastNotifier::new(
        settings.notifications.channel_capacity,
    ));

    let session = DashboardSession::open(
        auth,
        api,
        store,
        notifier,
        SessionOptions {
            notice_duration: settings.notifications.duration,
        },
    )?;
    info!(
        user_id = %session.user().id,
        base_url = %settings.api.base_url,
        "Session ready"
    );
    Ok(session)
}

async fn run_list(session: &DashboardSession) -> Result<(), AppError> {
    let state = session.load_albums().await;
    print_rows(&state)
}

async fn run_create(session: &DashboardSession, title: &str) -> Result<(), AppError> {
    let mut notices = session.notifications();

    match session.submit_create(title).await {
        SubmitOutcome::Created => {}
        SubmitOutcome::Rejected(errors) => return Err(errors.into()),
        SubmitOutcome::Failed(err) => return Err(err.into()),
        SubmitOutcome::Busy => {
            return Err(AppError::unexpected("a submission is already in progress"));
        }
    }

    let state = session.load_albums().await;
    let albums = match ListView::from_state(&state) {
        ListView::Ready { rows, .. } => RowView::from_rows(rows),
        ListView::Failed(err) => return Err(err.clone().into()),
        ListView::Loading => Vec::new(),
    };
    print_json(&CreateReport {
        notifications: drain_shown(&mut notices),
        albums,
    })
}

fn print_rows(state: &AlbumsState) -> Result<(), AppError> {
    match ListView::from_state(state) {
        ListView::Ready { rows, .. } => print_json(&RowView::from_rows(rows)),
        ListView::Failed(err) => Err(err.clone().into()),
        ListView::Loading => print_json(&Vec::<RowView<'_>>::new()),
    }
}

fn drain_shown(notices: &mut broadcast::Receiver<NotificationEvent>) -> Vec<NoticeView> {
    let mut shown = Vec::new();
    while let Ok(event) = notices.try_recv() {
        if let NotificationEvent::Shown(notification) = event {
            shown.push(NoticeView::from(notification));
        }
    }
    shown
}
