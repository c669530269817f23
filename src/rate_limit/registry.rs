//! Limiter instances per (routing value × endpoint class).

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use super::{Clock, RateLimiter, SystemClock};
use crate::models::{EndpointClass, Region, RoutingValue};

/// A `max_requests` per `window_ms` budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WindowLimit {
    pub max_requests: usize,
    pub window_ms: u64,
}

impl WindowLimit {
    pub const fn new(max_requests: usize, window_ms: u64) -> Self {
        Self {
            max_requests,
            window_ms,
        }
    }

    pub fn window(&self) -> Duration {
        Duration::from_millis(self.window_ms)
    }
}

/// Budgets applied to every routing value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// App-wide budget per routing value.
    #[serde(default = "default_application")]
    pub application: WindowLimit,

    #[serde(default = "default_league")]
    pub league: WindowLimit,

    #[serde(default = "default_summoner")]
    pub summoner: WindowLimit,

    #[serde(default = "default_match_ids")]
    pub match_ids: WindowLimit,

    #[serde(default = "default_match_detail")]
    pub match_detail: WindowLimit,
}

fn default_application() -> WindowLimit {
    WindowLimit::new(20, 1_000)
}

fn default_league() -> WindowLimit {
    WindowLimit::new(30, 10_000)
}

fn default_summoner() -> WindowLimit {
    WindowLimit::new(1_600, 60_000)
}

fn default_match_ids() -> WindowLimit {
    WindowLimit::new(600, 10_000)
}

fn default_match_detail() -> WindowLimit {
    WindowLimit::new(250, 10_000)
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            application: default_application(),
            league: default_league(),
            summoner: default_summoner(),
            match_ids: default_match_ids(),
            match_detail: default_match_detail(),
        }
    }
}

impl RateLimitConfig {
    pub fn limit_for(&self, class: EndpointClass) -> WindowLimit {
        match class {
            EndpointClass::Application => self.application,
            EndpointClass::League => self.league,
            EndpointClass::Summoner => self.summoner,
            EndpointClass::MatchIds => self.match_ids,
            EndpointClass::MatchDetail => self.match_detail,
        }
    }
}

/// Lazily created limiters shared by every fetch.
pub struct RateLimiterRegistry {
    config: RateLimitConfig,
    clock: Arc<dyn Clock>,
    limiters: Mutex<HashMap<(RoutingValue, EndpointClass), Arc<RateLimiter>>>,
    spawn_sweepers: bool,
}

impl RateLimiterRegistry {
    /// Registry on the system clock; each new limiter gets a sweeper task.
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config,
            clock: Arc::new(SystemClock),
            limiters: Mutex::new(HashMap::new()),
            spawn_sweepers: true,
        }
    }

    /// Registry on an explicit clock, without background sweepers.
    pub fn with_clock(config: RateLimitConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            config,
            clock,
            limiters: Mutex::new(HashMap::new()),
            spawn_sweepers: false,
        }
    }

    pub fn config(&self) -> &RateLimitConfig {
        &self.config
    }

    /// Get or create the limiter for one budget.
    pub async fn limiter(&self, route: RoutingValue, class: EndpointClass) -> Arc<RateLimiter> {
        let mut limiters = self.limiters.lock().await;
        limiters
            .entry((route, class))
            .or_insert_with(|| {
                let limit = self.config.limit_for(class);
                debug!(
                    "Creating limiter {}/{}: {} per {}ms",
                    route.as_str(),
                    class.as_str(),
                    limit.max_requests,
                    limit.window_ms
                );
                let limiter = Arc::new(RateLimiter::with_clock(
                    limit.max_requests,
                    limit.window(),
                    self.clock.clone(),
                ));
                if self.spawn_sweepers {
                    limiter.spawn_sweeper();
                }
                limiter
            })
            .clone()
    }

    /// Acquire the application budget and then the method budget.
    pub async fn acquire(&self, route: RoutingValue, class: EndpointClass) {
        self.limiter(route, EndpointClass::Application)
            .await
            .acquire()
            .await;
        if class != EndpointClass::Application {
            self.limiter(route, class).await.acquire().await;
        }
    }

    /// Acquire every quota one request spends: its continent's, then its
    /// region's.
    ///
    /// A platform host call also spends the continent pool its region shares
    /// with the rest of the continent. A continental host call spends the
    /// quota of `origin` when the caller names the region it works for.
    pub async fn acquire_for(
        &self,
        route: RoutingValue,
        class: EndpointClass,
        origin: Option<Region>,
    ) {
        for route in quota_routes(route, origin) {
            self.acquire(route, class).await;
        }
    }
}

/// Continent first, region second; an origin from another continent is ignored.
pub fn quota_routes(route: RoutingValue, origin: Option<Region>) -> Vec<RoutingValue> {
    match route {
        RoutingValue::Region(region) => vec![
            RoutingValue::Continent(region.continent()),
            RoutingValue::Region(region),
        ],
        RoutingValue::Continent(continent) => match origin {
            Some(region) if region.continent() == continent => vec![
                RoutingValue::Continent(continent),
                RoutingValue::Region(region),
            ],
            _ => vec![RoutingValue::Continent(continent)],
        },
    }
}
