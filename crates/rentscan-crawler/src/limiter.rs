use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time;

use crate::config::Throttle;

/// Hands out at most `per_second` permits every second.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    permits: Arc<Semaphore>,
}

impl RateLimiter {
    /// Must be called from within a tokio runtime.
    pub fn new(per_second: usize) -> Self {
        let permits = Arc::new(Semaphore::new(per_second));

        // The refill task stops once every clone of the limiter is dropped
        let permits_w = Arc::downgrade(&permits);
        tokio::spawn(async move {
            let mut ticks = time::interval(Duration::from_secs(1));
            ticks.tick().await;
            loop {
                ticks.tick().await;
                let Some(permits) = permits_w.upgrade() else {
                    break;
                };
                let available = permits.available_permits();
                permits.add_permits(per_second.saturating_sub(available));
            }
        });

        Self { permits }
    }

    pub async fn acquire(&self) {
        if let Ok(permit) = self.permits.acquire().await {
            permit.forget();
        }
    }
}

/// Politeness towards a listing site, shared by all walks of an adapter.
#[derive(Debug, Clone)]
pub enum Politeness {
    Unlimited,
    Concurrent(Arc<Semaphore>),
    PerSecond(RateLimiter),
    Delay { min: f32, max: f32 },
}

impl From<Option<Throttle>> for Politeness {
    fn from(throttle: Option<Throttle>) -> Self {
        match throttle {
            None => Self::Unlimited,
            Some(Throttle::Concurrent(n)) => Self::Concurrent(Arc::new(Semaphore::new(n.get()))),
            Some(Throttle::PerSecond(n)) => Self::PerSecond(RateLimiter::new(n.get())),
            Some(Throttle::Delay(min, max)) => Self::Delay { min, max },
        }
    }
}

impl Politeness {
    /// Waits until `page` of a walk may be downloaded. A returned permit has
    /// to be held until the download completes.
    pub async fn ready(&self, page: u32) -> Option<OwnedSemaphorePermit> {
        match self {
            Self::Unlimited => None,
            Self::Concurrent(permits) => permits.clone().acquire_owned().await.ok(),
            Self::PerSecond(limiter) => {
                limiter.acquire().await;
                None
            }
            Self::Delay { min, max } => {
                if page > 1 {
                    time::sleep(random_delay(*min, *max)).await;
                }
                None
            }
        }
    }
}

fn random_delay(min: f32, max: f32) -> Duration {
    let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
    let lo = lo.max(0.0);
    let secs = if hi > lo {
        rand::thread_rng().gen_range(lo..=hi)
    } else {
        lo
    };
    Duration::from_secs_f32(secs)
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroUsize;

    use super::*;

    #[test]
    fn random_delay_stays_in_bounds() {
        for _ in 0..100 {
            let d = random_delay(0.2, 0.4);
            assert!(d >= Duration::from_secs_f32(0.2) && d <= Duration::from_secs_f32(0.4));
        }
        assert_eq!(random_delay(1.0, 1.0), Duration::from_secs(1));
        assert_eq!(random_delay(-1.0, 0.0), Duration::ZERO);
    }

    #[tokio::test]
    async fn concurrent_permits_are_bounded() {
        let politeness = Politeness::from(Some(Throttle::Concurrent(NonZeroUsize::new(1).unwrap())));
        let first = politeness.ready(1).await;
        assert!(first.is_some());
        let Politeness::Concurrent(permits) = &politeness else {
            panic!("expected a semaphore");
        };
        assert_eq!(permits.available_permits(), 0);
        drop(first);
        assert_eq!(permits.available_permits(), 1);
    }

    #[tokio::test]
    async fn first_page_is_never_delayed() {
        let politeness = Politeness::from(Some(Throttle::Delay(30.0, 60.0)));
        let started = std::time::Instant::now();
        assert!(politeness.ready(1).await.is_none());
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
