//! Progress reporting for a batch of collection tasks

use std::sync::atomic::{AtomicUsize, Ordering};

/// Counts finished tasks and logs every 10% step
#[derive(Debug)]
pub struct ProgressCounter {
    label: String,
    total: usize,
    done: AtomicUsize,
}

impl ProgressCounter {
    pub fn new(label: impl Into<String>, total: usize) -> Self {
        Self {
            label: label.into(),
            total,
            done: AtomicUsize::new(0),
        }
    }

    /// Records one finished task and returns the number finished so far
    pub fn advance(&self, item: &str) -> usize {
        let done = self.done.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!("{}: {} done ({}/{})", self.label, item, done, self.total);

        if self.total > 0 {
            let before = (done - 1) * 10 / self.total;
            let after = done * 10 / self.total;
            if after > before {
                tracing::info!(
                    "{}: {}% ({}/{})",
                    self.label,
                    done * 100 / self.total,
                    done,
                    self.total
                );
            }
        }
        done
    }

    pub fn done(&self) -> usize {
        self.done.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> usize {
        self.total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_counter_is_monotonic() {
        let progress = ProgressCounter::new("test", 3);
        assert_eq!(progress.advance("a"), 1);
        assert_eq!(progress.advance("b"), 2);
        assert_eq!(progress.advance("c"), 3);
        assert_eq!(progress.done(), progress.total());
    }

    #[test]
    fn test_counter_across_threads() {
        let progress = Arc::new(ProgressCounter::new("threads", 400));
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let progress = progress.clone();
                std::thread::spawn(move || {
                    for i in 0..100 {
                        progress.advance(&i.to_string());
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(progress.done(), 400);
    }
}
