/**
 * A rate-monotonic scheduler for periodic services.
 *
 * A dedicated timer thread paces a global tick on the monotonic clock;
 * every service whose period divides the tick count is released through its
 * private binary semaphore. Each service runs on its own worker thread,
 * pinned to a CPU and given a `SCHED_FIFO` priority.
 *
 * The semaphore holds at most one pending release: if a worker has not
 * finished its previous invocation when the next release fires, the new
 * release coalesces with the pending one and the overrun is tolerated,
 * counted per service as a missed period. The real-time discipline is
 * expressed through affinity, priority and period, not queue depth.
 */
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Binary semaphore: capacity one, releases coalesce
struct Semaphore {
    pending: Mutex<bool>,
    released: Condvar,
}

impl Semaphore {
    fn new() -> Self {
        Semaphore {
            pending: Mutex::new(false),
            released: Condvar::new(),
        }
    }

    /// Signal the worker; true if a release was already pending
    fn release(&self) -> bool {
        let mut pending = self.pending.lock().expect("semaphore poisoned");
        let coalesced = *pending;
        *pending = true;
        self.released.notify_one();
        coalesced
    }

    /// Block until released, then consume the permit
    fn acquire(&self) {
        let mut pending = self.pending.lock().expect("semaphore poisoned");
        while !*pending {
            pending = self
                .released
                .wait(pending)
                .expect("semaphore poisoned");
        }
        *pending = false;
    }
}

/// Worker runtime statistics, updated by the worker alone and read by the
/// main thread once the scheduler is stopped.
#[derive(Debug, Clone, Copy)]
pub struct RuntimeStats {
    pub min_us: u64,
    pub max_us: u64,
    sum_us: u64,
    pub count: u32,
}

impl Default for RuntimeStats {
    fn default() -> Self {
        RuntimeStats {
            min_us: u64::MAX,
            max_us: 0,
            sum_us: 0,
            count: 0,
        }
    }
}

impl RuntimeStats {
    fn record(&mut self, elapsed: Duration) {
        let us = elapsed.as_micros() as u64;
        self.min_us = self.min_us.min(us);
        self.max_us = self.max_us.max(us);
        self.sum_us += us;
        self.count += 1;
        // zero out before the counter wraps to keep the average meaningful
        if self.count == u32::MAX {
            self.sum_us = 0;
            self.count = 0;
        }
    }

    pub fn mean_us(&self) -> f64 {
        if self.count == 0 {
            0.
        } else {
            self.sum_us as f64 / f64::from(self.count)
        }
    }

    pub fn jitter_us(&self) -> u64 {
        self.max_us.saturating_sub(self.min_us)
    }
}

/// Placement and cadence of one service
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub name: String,
    /// CPU the worker is pinned to
    pub affinity: usize,
    /// SCHED_FIFO priority, 1..=99
    pub priority: i32,
    /// Release period, in scheduler ticks
    pub period: u32,
}

struct ServiceHandle {
    name: String,
    period: u32,
    semaphore: Arc<Semaphore>,
    running: Arc<AtomicBool>,
    missed: Arc<AtomicU64>,
    stats: Arc<Mutex<RuntimeStats>>,
    worker: Option<JoinHandle<()>>,
}

/// What a service did while the scheduler was running
#[derive(Debug, Clone)]
pub struct ServiceReport {
    pub name: String,
    pub period: u32,
    pub stats: RuntimeStats,
    /// Releases that found the previous one still pending
    pub missed: u64,
}

impl fmt::Display for ServiceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "*** {} (period {} ticks) ***", self.name, self.period)?;
        if self.stats.count == 0 {
            writeln!(f, "  never released")?;
            return Ok(());
        }
        writeln!(f, "  WCET:         {:.3} ms", self.stats.max_us as f64 / 1e3)?;
        writeln!(f, "  Min runtime:  {:.3} ms", self.stats.min_us as f64 / 1e3)?;
        writeln!(f, "  Avg runtime:  {:.3} ms", self.stats.mean_us() / 1e3)?;
        writeln!(f, "  Jitter:       {:.3} ms", self.stats.jitter_us() as f64 / 1e3)?;
        writeln!(f, "  Runs:         {}", self.stats.count)?;
        writeln!(f, "  Missed:       {}", self.missed)?;
        Ok(())
    }
}

struct TimerEntry {
    period: u64,
    semaphore: Arc<Semaphore>,
    missed: Arc<AtomicU64>,
}

/// The scheduler owns the service set and the periodic timer
pub struct Scheduler {
    services: Vec<ServiceHandle>,
    tick: Arc<AtomicU64>,
    tick_interval: Duration,
    timer_running: Arc<AtomicBool>,
    timer: Option<JoinHandle<()>>,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    /// A scheduler with the standard 1 ms tick
    pub fn new() -> Self {
        Self::with_tick(Duration::from_millis(1))
    }

    pub fn with_tick(tick_interval: Duration) -> Self {
        Scheduler {
            services: Vec::new(),
            tick: Arc::new(AtomicU64::new(0)),
            tick_interval,
            timer_running: Arc::new(AtomicBool::new(false)),
            timer: None,
        }
    }

    /// Register a service and spawn its worker thread.
    ///
    /// The worker configures its own affinity and priority, then blocks on
    /// the semaphore until the timer starts releasing it.
    pub fn add_service<F>(&mut self, config: ServiceConfig, mut callback: F)
    where
        F: FnMut() + Send + 'static,
    {
        let semaphore = Arc::new(Semaphore::new());
        let running = Arc::new(AtomicBool::new(true));
        let stats = Arc::new(Mutex::new(RuntimeStats::default()));

        let worker = {
            let semaphore = semaphore.clone();
            let running = running.clone();
            let stats = stats.clone();
            let name = config.name.clone();
            let affinity = config.affinity;
            let priority = config.priority;
            thread::Builder::new()
                .name(config.name.clone())
                .spawn(move || {
                    configure_thread(affinity, priority, &name);
                    loop {
                        semaphore.acquire();
                        if !running.load(Ordering::Acquire) {
                            break;
                        }
                        let started = Instant::now();
                        callback();
                        stats
                            .lock()
                            .expect("stats poisoned")
                            .record(started.elapsed());
                    }
                    debug!("{name}: worker exiting");
                })
                .expect("failed to spawn service worker")
        };

        self.services.push(ServiceHandle {
            name: config.name,
            period: config.period.max(1),
            semaphore,
            running,
            missed: Arc::new(AtomicU64::new(0)),
            stats,
            worker: Some(worker),
        });
    }

    /// Arm the periodic timer and begin releasing services
    pub fn start(&mut self) {
        if self.timer.is_some() {
            return;
        }
        let entries: Vec<TimerEntry> = self
            .services
            .iter()
            .map(|s| TimerEntry {
                period: u64::from(s.period),
                semaphore: s.semaphore.clone(),
                missed: s.missed.clone(),
            })
            .collect();
        let tick = self.tick.clone();
        let interval = self.tick_interval;
        let timer_running = self.timer_running.clone();
        timer_running.store(true, Ordering::Release);

        let timer = thread::Builder::new()
            .name("sched-tick".to_string())
            .spawn(move || {
                let mut next = Instant::now() + interval;
                while timer_running.load(Ordering::Acquire) {
                    let now = Instant::now();
                    if next > now {
                        thread::sleep(next - now);
                    }
                    next += interval;
                    let t = tick.fetch_add(1, Ordering::AcqRel) + 1;
                    for entry in &entries {
                        if t % entry.period == 0
                            && entry.semaphore.release()
                        {
                            entry.missed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            })
            .expect("failed to spawn timer thread");
        self.timer = Some(timer);
    }

    /// Disarm the timer, stop every service and join all threads
    pub fn stop(&mut self) {
        self.timer_running.store(false, Ordering::Release);
        if let Some(timer) = self.timer.take() {
            let _ = timer.join();
        }
        for service in &mut self.services {
            service.running.store(false, Ordering::Release);
            service.semaphore.release();
            if let Some(worker) = service.worker.take() {
                let _ = worker.join();
            }
        }
    }

    /// Ticks elapsed since start
    pub fn tick_count(&self) -> u64 {
        self.tick.load(Ordering::Acquire)
    }

    /// Per-service runtime reports; call after [`Scheduler::stop`] for a
    /// final, quiescent view.
    pub fn reports(&self) -> Vec<ServiceReport> {
        self.services
            .iter()
            .map(|s| ServiceReport {
                name: s.name.clone(),
                period: s.period,
                stats: *s.stats.lock().expect("stats poisoned"),
                missed: s.missed.load(Ordering::Relaxed),
            })
            .collect()
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(target_os = "linux")]
fn configure_thread(affinity: usize, priority: i32, name: &str) {
    unsafe {
        let mut cpuset: libc::cpu_set_t = std::mem::zeroed();
        libc::CPU_ZERO(&mut cpuset);
        libc::CPU_SET(affinity, &mut cpuset);
        if libc::pthread_setaffinity_np(
            libc::pthread_self(),
            std::mem::size_of::<libc::cpu_set_t>(),
            &cpuset,
        ) != 0
        {
            warn!("{name}: failed to pin to CPU {affinity}");
        }

        let param = libc::sched_param {
            sched_priority: priority,
        };
        if libc::pthread_setschedparam(
            libc::pthread_self(),
            libc::SCHED_FIFO,
            &param,
        ) != 0
        {
            warn!(
                "{name}: failed to set SCHED_FIFO priority {priority}, \
                 running with default scheduling"
            );
        }
    }
}

#[cfg(not(target_os = "linux"))]
fn configure_thread(_affinity: usize, _priority: i32, _name: &str) {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    #[test]
    fn test_semaphore_coalesces() {
        let semaphore = Semaphore::new();
        assert!(!semaphore.release());
        // a second release while one is pending coalesces
        assert!(semaphore.release());
        semaphore.acquire();
        assert!(!semaphore.release());
    }

    #[test]
    fn test_periodic_release() {
        let mut scheduler = Scheduler::with_tick(Duration::from_millis(1));
        let count = Arc::new(AtomicU32::new(0));
        let seen = count.clone();
        scheduler.add_service(
            ServiceConfig {
                name: "counter".to_string(),
                affinity: 0,
                priority: 1,
                period: 5,
            },
            move || {
                seen.fetch_add(1, Ordering::Relaxed);
            },
        );
        scheduler.start();
        thread::sleep(Duration::from_millis(200));
        scheduler.stop();

        let runs = count.load(Ordering::Relaxed);
        assert!(runs >= 5, "service only ran {runs} times");

        let reports = scheduler.reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].name, "counter");
        assert!(reports[0].stats.count >= 5);
        assert!(scheduler.tick_count() >= 25);
    }

    #[test]
    fn test_overrun_coalesces_releases() {
        let mut scheduler = Scheduler::with_tick(Duration::from_millis(1));
        scheduler.add_service(
            ServiceConfig {
                name: "slow".to_string(),
                affinity: 0,
                priority: 1,
                period: 1,
            },
            || thread::sleep(Duration::from_millis(20)),
        );
        scheduler.start();
        thread::sleep(Duration::from_millis(150));
        scheduler.stop();

        let report = &scheduler.reports()[0];
        assert!(report.missed > 0, "expected coalesced releases");
        // the worker never executes more often than its releases
        assert!(report.stats.count <= 150);
    }

    #[test]
    fn test_stop_without_start() {
        let mut scheduler = Scheduler::new();
        scheduler.add_service(
            ServiceConfig {
                name: "idle".to_string(),
                affinity: 0,
                priority: 1,
                period: 100,
            },
            || {},
        );
        // workers blocked on their semaphore must unblock and join
        scheduler.stop();
        assert_eq!(scheduler.reports()[0].stats.count, 0);
    }
}
