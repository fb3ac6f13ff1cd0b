use chrono::{DateTime, Duration, TimeZone, Utc};
use clap::Parser;
use interfaces::{CategoryId, EmailFrequency, PortfolioId, Subscriber};
use portfolio_digest::config::Cli;
use portfolio_digest::index::build_index;
use portfolio_digest::{
    filter_news_after, Aggregator, CategoryPortfolios, DigestError, DigestPipeline, HoldingRecord,
    MockContentProvider, NewsRecord, PipelineConfig, PortfolioCategoryIndex, PortfolioPage, Result,
};
use std::collections::HashSet;
use std::sync::{Arc, Once};
use tokio::sync::mpsc;
use tracing::info;

static INIT: Once = Once::new();

fn init_tracing() {
    INIT.call_once(|| {
        tracing_subscriber::fmt()
            .with_max_level(tracing::Level::INFO)
            .try_init()
            .ok();
    });
}

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()
}

fn news_at(slug: &str, published: DateTime<Utc>) -> NewsRecord {
    NewsRecord {
        slug: slug.to_string(),
        title: format!("Story {}", slug),
        url: Some(format!("https://news.example.com/{}", slug)),
        source: None,
        published_on: published.to_rfc3339(),
    }
}

fn fresh_news(slug: &str) -> NewsRecord {
    news_at(slug, now() - Duration::hours(1))
}

fn holding(slug: &str) -> HoldingRecord {
    HoldingRecord {
        slug: slug.to_string(),
        title: slug.to_uppercase(),
        price: 10.0,
        movement_24h: 1.0,
        movement_7d: 2.0,
        movement_1y: 3.0,
    }
}

fn subscriber(name: &str, categories: &[&str]) -> Subscriber {
    Subscriber {
        name: name.to_string(),
        email: format!("{}@example.com", name),
        categories: categories.iter().map(|c| CategoryId::from(*c)).collect(),
        frequency: EmailFrequency::Daily,
    }
}

fn slugs(news: &[NewsRecord]) -> Vec<&str> {
    news.iter().map(|n| n.slug.as_str()).collect()
}

fn config() -> PipelineConfig {
    PipelineConfig {
        lookback: Duration::hours(24),
        ..PipelineConfig::default()
    }
}

#[test]
fn test_index_maps_every_portfolio_to_its_category() {
    let index: PortfolioCategoryIndex = vec![
        CategoryPortfolios {
            category: CategoryId::from("x"),
            portfolios: vec![PortfolioId::from("p1"), PortfolioId::from("p2")],
        },
        CategoryPortfolios {
            category: CategoryId::from("y"),
            portfolios: vec![PortfolioId::from("p2")],
        },
    ]
    .into_iter()
    .collect();

    assert_eq!(index.len(), 2);
    assert_eq!(index.categories_for(&PortfolioId::from("p1")), Some(&[CategoryId::from("x")][..]));

    let p2: HashSet<&CategoryId> = index.categories_for(&PortfolioId::from("p2")).unwrap().iter().collect();
    assert!(p2.contains(&CategoryId::from("x")));
    assert!(p2.contains(&CategoryId::from("y")));

    let universe: HashSet<PortfolioId> = index.portfolio_ids().into_iter().collect();
    assert_eq!(universe, HashSet::from([PortfolioId::from("p1"), PortfolioId::from("p2")]));
}

#[tokio::test]
async fn test_index_builder_drains_until_closed() {
    let (tx, rx) = mpsc::unbounded_channel();
    let builder = tokio::spawn(build_index(rx));

    tx.send(CategoryPortfolios {
        category: CategoryId::from("x"),
        portfolios: vec![PortfolioId::from("p1"), PortfolioId::from("p2")],
    })
    .unwrap();
    drop(tx);

    let index = builder.await.unwrap();
    for p in ["p1", "p2"] {
        assert!(index.categories_for(&PortfolioId::from(p)).unwrap().contains(&CategoryId::from("x")));
    }
}

#[test]
fn test_aggregator_joins_page_onto_every_category() {
    let index: PortfolioCategoryIndex = vec![
        CategoryPortfolios {
            category: CategoryId::from("cat-a"),
            portfolios: vec![PortfolioId::from("p1")],
        },
        CategoryPortfolios {
            category: CategoryId::from("cat-b"),
            portfolios: vec![PortfolioId::from("p1")],
        },
    ]
    .into_iter()
    .collect();

    let mut aggregator = Aggregator::new(&index);
    assert!(aggregator.add_page(PortfolioPage {
        slug: PortfolioId::from("p1"),
        news: vec![fresh_news("n1")],
        holdings: vec![holding("h1")],
    }));
    assert!(!aggregator.add_page(PortfolioPage {
        slug: PortfolioId::from("orphan"),
        news: vec![fresh_news("n9")],
        holdings: vec![],
    }));

    let aggregates = aggregator.finish();
    assert_eq!(aggregates.len(), 2);
    for category in ["cat-a", "cat-b"] {
        let aggregate = &aggregates[&CategoryId::from(category)];
        assert_eq!(slugs(&aggregate.news), vec!["n1"]);
        assert_eq!(aggregate.holdings.len(), 1);
    }
}

#[test]
fn test_aggregator_dedups_records_shared_between_portfolios() {
    // The same category listed twice under a portfolio is tolerated here.
    let index: PortfolioCategoryIndex = vec![
        CategoryPortfolios {
            category: CategoryId::from("cat-a"),
            portfolios: vec![PortfolioId::from("p1"), PortfolioId::from("p2"), PortfolioId::from("p1")],
        },
    ]
    .into_iter()
    .collect();

    let mut aggregator = Aggregator::new(&index);
    aggregator.add_page(PortfolioPage {
        slug: PortfolioId::from("p1"),
        news: vec![fresh_news("n1"), fresh_news("n2")],
        holdings: vec![holding("h1")],
    });
    aggregator.add_page(PortfolioPage {
        slug: PortfolioId::from("p2"),
        news: vec![fresh_news("n2"), fresh_news("n3")],
        holdings: vec![holding("h1"), holding("h2")],
    });

    let aggregates = aggregator.finish();
    let aggregate = &aggregates[&CategoryId::from("cat-a")];
    assert_eq!(slugs(&aggregate.news), vec!["n1", "n2", "n3"]);
    assert_eq!(aggregate.holdings.len(), 2);
}

#[test]
fn test_recency_filter_boundary() {
    let cutoff = now() - Duration::hours(24);
    let news = vec![
        news_at("after", cutoff + Duration::seconds(1)),
        news_at("before", cutoff - Duration::seconds(1)),
        news_at("exact", cutoff),
        NewsRecord {
            published_on: "yesterday-ish".to_string(),
            ..fresh_news("garbage")
        },
        NewsRecord {
            published_on: "2024-03-10T10:00:00+02:00".to_string(),
            ..fresh_news("offset")
        },
    ];

    let kept = filter_news_after(news, cutoff);
    assert_eq!(slugs(&kept), vec!["after", "offset"]);
}

#[tokio::test]
async fn test_end_to_end_subscriber_union() -> Result<()> {
    init_tracing();

    let provider = Arc::new(
        MockContentProvider::new()
            .with_category("cat-a", &["p1", "p2"])
            .with_category("cat-b", &["p2", "p3"])
            .with_portfolio("p1", vec![fresh_news("n1")], vec![holding("h1")])
            .with_portfolio("p2", vec![fresh_news("shared")], vec![holding("h-shared")])
            .with_portfolio("p3", vec![fresh_news("n3"), fresh_news("shared")], vec![holding("h3")]),
    );
    let pipeline = DigestPipeline::new(provider.clone(), config());

    let subscribers = vec![
        subscriber("both", &["cat-a", "cat-b"]),
        subscriber("only-b", &["cat-b"]),
        subscriber("unknown", &["cat-z"]),
    ];
    let run = pipeline.run_at(subscribers, now()).await?;
    info!("Stats: {}", run.stats);

    assert_eq!(run.stats.categories_requested, 3);
    assert_eq!(run.stats.categories_resolved, 2);
    assert_eq!(run.stats.portfolios_requested, 3);
    assert_eq!(run.stats.aggregates, 2);

    let bundles = run.collect().await;
    let names: Vec<&str> = bundles.iter().map(|b| b.name.as_str()).collect();
    assert_eq!(names, vec!["both", "only-b", "unknown"]);

    let both = &bundles[0];
    assert_eq!(both.email, "both@example.com");
    let news: HashSet<&str> = both.news.iter().map(|n| n.slug.as_str()).collect();
    assert_eq!(news, HashSet::from(["n1", "shared", "n3"]));
    assert_eq!(both.news.len(), 3, "shared story must appear once");
    assert_eq!(both.holdings.len(), 3);

    let only_b: HashSet<&str> = bundles[1].news.iter().map(|n| n.slug.as_str()).collect();
    assert_eq!(only_b, HashSet::from(["shared", "n3"]));

    assert!(bundles[2].news.is_empty());
    assert!(bundles[2].holdings.is_empty());
    Ok(())
}

#[tokio::test]
async fn test_each_portfolio_is_requested_once() -> Result<()> {
    init_tracing();

    let provider = Arc::new(
        MockContentProvider::new()
            .with_category("cat-a", &["p1", "p2"])
            .with_category("cat-b", &["p1", "p2"])
            .with_portfolio("p1", vec![fresh_news("n1")], vec![])
            .with_portfolio("p2", vec![fresh_news("n2")], vec![]),
    );
    let pipeline = DigestPipeline::new(provider.clone(), config());

    // Duplicate interests across subscribers collapse to one category fetch each.
    let subscribers = vec![subscriber("a", &["cat-a", "cat-b"]), subscriber("b", &["cat-b", "cat-a"])];
    let bundles = pipeline.run_at(subscribers, now()).await?.collect().await;

    assert_eq!(bundles.len(), 2);
    assert_eq!(provider.category_calls(), 2);
    assert_eq!(provider.portfolio_calls(), 2);
    let requested: HashSet<PortfolioId> = provider.portfolio_requests().into_iter().collect();
    assert_eq!(requested.len(), 2);
    Ok(())
}

#[tokio::test]
async fn test_partial_failure_is_tolerated() -> Result<()> {
    init_tracing();

    let provider = Arc::new(
        MockContentProvider::new()
            .with_category("cat-a", &["p1", "p2"])
            .with_category("cat-broken", &["p3"])
            .with_failure("cat-broken")
            .with_portfolio("p1", vec![fresh_news("n1")], vec![holding("h1")])
            .with_portfolio("p2", vec![fresh_news("n2")], vec![holding("h2")])
            .with_failure("p2"),
    );
    let pipeline = DigestPipeline::new(provider.clone(), config());

    let run = pipeline
        .run_at(vec![subscriber("jo", &["cat-a", "cat-broken"])], now())
        .await?;
    assert_eq!(run.stats.category_failures, 1);
    assert_eq!(run.stats.portfolio_failures, 1);
    assert_eq!(run.stats.portfolios_resolved, 1);

    let bundles = run.collect().await;
    assert_eq!(bundles.len(), 1);
    assert_eq!(slugs(&bundles[0].news), vec!["n1"]);
    assert_eq!(bundles[0].holdings.len(), 1);
    assert_eq!(bundles[0].holdings[0].slug, "h1");
    Ok(())
}

#[tokio::test]
async fn test_failure_threshold_aborts_run() {
    init_tracing();

    let provider = Arc::new(
        MockContentProvider::new()
            .with_category("cat-a", &["p1", "p2"])
            .with_failure("p1")
            .with_failure("p2"),
    );
    let pipeline = DigestPipeline::new(
        provider,
        PipelineConfig {
            max_fetch_failures: Some(1),
            ..config()
        },
    );

    let result = pipeline.run_at(vec![subscriber("jo", &["cat-a"])], now()).await;
    match result {
        Err(DigestError::TooManyFailures { failures, limit }) => {
            assert_eq!(failures, 2);
            assert_eq!(limit, 1);
        }
        Err(e) => panic!("unexpected error: {}", e),
        Ok(_) => panic!("run should have been aborted"),
    }
}

#[tokio::test]
async fn test_stale_news_filtered_but_holdings_kept() -> Result<()> {
    init_tracing();

    let provider = Arc::new(
        MockContentProvider::new()
            .with_category("cat-a", &["p1"])
            .with_portfolio(
                "p1",
                vec![
                    fresh_news("fresh"),
                    news_at("stale", now() - Duration::days(3)),
                ],
                vec![holding("h1")],
            ),
    );
    let pipeline = DigestPipeline::new(provider, config());

    let bundles = pipeline
        .run_at(vec![subscriber("jo", &["cat-a"])], now())
        .await?
        .collect()
        .await;

    assert_eq!(slugs(&bundles[0].news), vec!["fresh"]);
    assert_eq!(bundles[0].holdings.len(), 1);
    Ok(())
}

#[tokio::test]
async fn test_empty_subscriber_list_short_circuits() -> Result<()> {
    let provider = Arc::new(MockContentProvider::new().with_category("cat-a", &["p1"]));
    let pipeline = DigestPipeline::new(provider.clone(), config());

    let run = pipeline.run_at(Vec::new(), now()).await?;
    assert_eq!(run.stats.categories_requested, 0);
    assert!(run.collect().await.is_empty());
    assert_eq!(provider.category_calls(), 0);
    Ok(())
}

#[tokio::test]
async fn test_concurrent_fetches_with_latency() -> Result<()> {
    init_tracing();

    let mut provider = MockContentProvider::new().with_delay(20);
    let mut expected = HashSet::new();
    for i in 0..12 {
        let category = format!("cat-{}", i);
        let portfolio = format!("p-{}", i);
        provider = provider
            .with_category(&category, &[portfolio.as_str()])
            .with_portfolio(&portfolio, vec![fresh_news(&format!("n-{}", i))], vec![]);
        expected.insert(format!("n-{}", i));
    }
    let pipeline = DigestPipeline::new(
        Arc::new(provider),
        PipelineConfig {
            max_concurrent_fetches: 4,
            ..config()
        },
    );

    let categories: Vec<String> = (0..12).map(|i| format!("cat-{}", i)).collect();
    let category_refs: Vec<&str> = categories.iter().map(|c| c.as_str()).collect();
    let bundles = pipeline
        .run_at(vec![subscriber("all", &category_refs)], now())
        .await?
        .collect()
        .await;

    let got: HashSet<String> = bundles[0].news.iter().map(|n| n.slug.clone()).collect();
    assert_eq!(got, expected);
    Ok(())
}

#[test]
fn test_lookback_out_of_range_is_a_config_error() {
    for hours in ["3000000000000", "2400000000", "0"] {
        let cli = Cli::parse_from(["portfolio-digest", "--lookback-hours", hours]);
        match cli.pipeline_config() {
            Err(DigestError::Config(_)) => {}
            Err(e) => panic!("unexpected error for {} hours: {}", hours, e),
            Ok(_) => panic!("{} hours should be rejected", hours),
        }
    }

    let cli = Cli::parse_from(["portfolio-digest", "--lookback-hours", "48"]);
    assert_eq!(cli.pipeline_config().unwrap().lookback, Duration::hours(48));
}

#[tokio::test]
async fn test_unrepresentable_cutoff_fails_before_fetching() {
    init_tracing();

    let provider = Arc::new(MockContentProvider::new().with_category("cat-a", &["p1"]));
    let pipeline = DigestPipeline::new(
        provider.clone(),
        PipelineConfig {
            lookback: Duration::try_hours(2_400_000_000).unwrap(),
            ..config()
        },
    );

    let result = pipeline.run_at(vec![subscriber("jo", &["cat-a"])], now()).await;
    assert!(matches!(result, Err(DigestError::Config(_))));
    assert_eq!(provider.category_calls(), 0);
}
