//! Page-level price widget: one parameterized refresh loop feeding any
//! number of injected views.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::chart::{ChartHandle, Surface};
use crate::clock::EpochMillis;
use crate::fallback::{self, FALLBACK_PRICE_USD};
use crate::format::{format_change, format_price};
use crate::service::{FeedStatus, PriceService};
use crate::{PricePoint, PriceSeries, ProviderId, RangeKey, SeriesStats};

#[derive(Debug, Clone, PartialEq)]
pub struct WidgetConfig {
    /// History range to load alongside the price; `None` for a ticker-only widget.
    pub range: Option<RangeKey>,
    pub refresh_interval: Duration,
    /// Fold each fresh price into the displayed history.
    pub merge_live_price: bool,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            range: None,
            refresh_interval: Duration::from_secs(60),
            merge_live_price: true,
        }
    }
}

/// Everything a view needs to render one refresh.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WidgetFrame {
    pub price: f64,
    pub price_label: String,
    pub change_label: Option<String>,
    pub status: FeedStatus,
    pub status_label: String,
    pub source: Option<ProviderId>,
    pub updated_at: EpochMillis,
    pub range: Option<RangeKey>,
    pub series: Option<PriceSeries>,
    pub history_status: Option<FeedStatus>,
    pub stats: Option<SeriesStats>,
}

/// Render target for widget frames (DOM binding, terminal line, chart...).
pub trait WidgetView: Send {
    fn render_frame(&mut self, frame: &WidgetFrame);
}

impl<F> WidgetView for F
where
    F: FnMut(&WidgetFrame) + Send,
{
    fn render_frame(&mut self, frame: &WidgetFrame) {
        self(frame)
    }
}

impl<S: Surface + 'static> WidgetView for ChartHandle<S> {
    fn render_frame(&mut self, frame: &WidgetFrame) {
        if let Some(series) = &frame.series {
            if let Err(error) = self.update(series) {
                debug!("chart view skipped frame: {error}");
            }
        }
    }
}

struct WidgetInner {
    service: PriceService,
    config: WidgetConfig,
    views: Mutex<Vec<Box<dyn WidgetView>>>,
}

pub struct PriceWidget {
    inner: Arc<WidgetInner>,
    task: Option<JoinHandle<()>>,
}

impl std::fmt::Debug for PriceWidget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriceWidget")
            .field("config", &self.inner.config)
            .field("running", &self.task.is_some())
            .finish_non_exhaustive()
    }
}

pub fn create_price_widget(
    service: PriceService,
    config: WidgetConfig,
    views: Vec<Box<dyn WidgetView>>,
) -> PriceWidget {
    PriceWidget {
        inner: Arc::new(WidgetInner {
            service,
            config,
            views: Mutex::new(views),
        }),
        task: None,
    }
}

impl PriceWidget {
    pub fn config(&self) -> &WidgetConfig {
        &self.inner.config
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    /// Loads once and renders to every view.
    pub async fn refresh_once(&self) -> WidgetFrame {
        self.inner.refresh().await
    }

    /// Renders immediately, then every `refresh_interval`. Restarting
    /// replaces the previous loop; overlapping ticks are skipped.
    pub fn start(&mut self) {
        self.stop();
        let inner = Arc::clone(&self.inner);
        self.task = Some(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(inner.config.refresh_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                ticker.tick().await;
                inner.refresh().await;
            }
        }));
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl Drop for PriceWidget {
    fn drop(&mut self) {
        self.stop();
    }
}

impl WidgetInner {
    async fn refresh(&self) -> WidgetFrame {
        let frame = self.load().await;
        let mut views = self.views.lock().expect("widget views lock is not poisoned");
        for view in views.iter_mut() {
            view.render_frame(&frame);
        }
        frame
    }

    async fn load(&self) -> WidgetFrame {
        let (price, change, status, source, updated_at) = match self.service.get_snapshot().await {
            Ok(served) => (
                served.value.price,
                served.value.change_24h,
                served.status,
                served.source,
                served.updated_at,
            ),
            Err(error) => {
                warn!("price unavailable, showing fallback: {error}");
                (
                    FALLBACK_PRICE_USD,
                    None,
                    FeedStatus::Unavailable,
                    None,
                    self.service.now_ms(),
                )
            }
        };

        let mut series = None;
        let mut history_status = None;
        if let Some(range) = self.config.range {
            let (mut loaded, loaded_status) = match self.service.get_history(range).await {
                Ok(served) => (served.value, served.status),
                Err(error) => {
                    warn!(%range, "history unavailable, showing fallback: {error}");
                    (fallback::history_for(range), FeedStatus::Unavailable)
                }
            };
            if range == RangeKey::Max {
                loaded = fallback::extend_to_genesis(&loaded);
            }
            if self.config.merge_live_price && status != FeedStatus::Unavailable {
                loaded = PriceService::merge_live_sample(
                    &loaded,
                    PricePoint {
                        time: updated_at,
                        price,
                    },
                );
            }
            history_status = Some(loaded_status);
            series = Some(loaded);
        }

        let stats = series.as_ref().and_then(PriceSeries::stats);
        let change_label = match (change, &stats) {
            (Some(change), _) => Some(format!("{} 24h", format_change(change))),
            (None, Some(stats)) => Some(format_change(stats.change_pct)),
            (None, None) => None,
        };

        WidgetFrame {
            price,
            price_label: format_price(price),
            change_label,
            status,
            status_label: status.label(source),
            source,
            updated_at,
            range: self.config.range,
            series,
            history_status,
            stats,
        }
    }
}
