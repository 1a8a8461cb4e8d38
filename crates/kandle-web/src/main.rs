use dotenv::dotenv;
use kandle_feed::{Binance, LiveFeed, LiveSeries, Range};
use lazy_static::lazy_static;
use rocket::fs::{relative, FileServer, Options};
use rocket::serde::json::Json;
use rocket::{get, launch, routes, State};
use rocket_dyn_templates::{context, Template};
use tracing::{subscriber, Level};
use tracing_subscriber::FmtSubscriber;

lazy_static! {
    /// Pairs charted by the live page, in display order.
    ///
    /// This is currently maintained manually.
    pub static ref PAIRS: Vec<&'static str> = vec!["BTCUSDT", "ETHUSDT"];
}

/// The symbol whose time axis the chart aligns to.
const PRIORITY: &str = "BTCUSDT";

type Feed = LiveFeed<Binance>;

fn preprocess() {
    dotenv().ok();
    let level = match dotenv::var("TRACE_LEVEL").as_deref() {
        Ok("trace") => Level::TRACE,
        Ok("debug") => Level::DEBUG,
        Ok("warn") => Level::WARN,
        Ok("error") => Level::ERROR,
        _ => Level::INFO,
    };
    let my_subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    subscriber::set_global_default(my_subscriber).expect("Set subscriber");
}

#[launch]
fn rocket() -> _ {
    preprocess();

    let feed: Feed = LiveFeed::new(
        Binance::new().expect("Binance client to build"),
        PAIRS.iter().copied(),
        PRIORITY,
    );

    rocket::build()
        // add templating system
        .attach(Template::fairing())

        // shared fetcher + fallback cache
        .manage(feed)

        // serve content from disk
        .mount("/public", FileServer::new(relative!("/public"), Options::Missing | Options::NormalizeDirs))

        // register routes
        .mount("/", routes![
            root,
            live_data
        ])
}

// home: the live chart page
#[get("/")]
async fn root() -> Template {
    Template::render("live_charts", context! {
        ranges: [
            Range::ShortLive.as_str(),
            Range::MediumLive.as_str(),
            Range::LongLive.as_str(),
        ],
        pairs: PAIRS.iter().map(|p| LiveSeries::display_key(p)).collect::<Vec<String>>(),
    })
}

// live data API polled by the chart page
#[get("/api/live-data?<range>")]
async fn live_data(range: Option<&str>, feed: &State<Feed>) -> Json<LiveSeries> {
    let range = Range::parse(range.unwrap_or_default());
    Json(feed.series(range).await)
}
