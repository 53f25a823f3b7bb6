//! Wall-clock timers for measuring the phases of a tool run.

use log::info;
use std::time::{Duration, Instant};

#[derive(Debug)]
pub struct Timer<'a> {
    name: &'a str,
    runs: u32,
    total: Duration,
    last: Duration,
    started: Option<Instant>,
}

impl<'a> Timer<'a> {
    pub fn new(name: &'a str) -> Self {
        Timer {
            name,
            runs: 0,
            total: Duration::default(),
            last: Duration::default(),
            started: None,
        }
    }

    /// Starts a measurement.
    ///
    /// # Panics
    /// Panics when the timer is already running.
    pub fn start(&mut self) {
        assert!(
            self.started.is_none(),
            "timer {} started while running",
            self.name
        );
        self.started = Some(Instant::now());
    }

    /// Stops the running measurement and adds it to the total.
    ///
    /// # Panics
    /// Panics when the timer is not running.
    pub fn stop(&mut self) {
        match self.started.take() {
            Some(started) => {
                self.last = started.elapsed();
                self.total += self.last;
                self.runs += 1;
            }
            None => panic!("timer {} stopped while not running", self.name),
        }
    }

    #[inline]
    pub fn name(&self) -> &'a str {
        self.name
    }

    #[inline]
    pub fn runs(&self) -> u32 {
        self.runs
    }

    #[inline]
    pub fn total(&self) -> Duration {
        self.total
    }

    #[inline]
    pub fn last(&self) -> Duration {
        self.last
    }

    pub fn average(&self) -> Duration {
        if self.runs == 0 {
            return Duration::default();
        }
        self.total / self.runs
    }

    /// Logs the totals of this timer.
    pub fn report(&self) {
        info!(
            "{}={}ms (runs={} avg={}us)",
            self.name,
            self.total.as_millis(),
            self.runs,
            self.average().as_micros()
        );
    }
}

/// Generates a struct of named [`Timer`]s with a `Default` implementation
/// and a `report()` method logging every timer in declaration order.
///
/// ```rust
/// use mpcore::impl_timings;
///
/// impl_timings!(pub Timings; load, save);
///
/// let timings = Timings::default();
/// assert_eq!(timings.load.name(), "load");
/// timings.report();
/// ```
#[macro_export]
macro_rules! impl_timings {
    ($vis:vis $name:ident; $($it:ident),+) => {
        #[derive(Debug)]
        $vis struct $name<'a> {
            $(pub $it: $crate::perf::Timer<'a>,)+
        }

        impl<'a> Default for $name<'a> {
            fn default() -> Self {
                $name {
                    $($it: $crate::perf::Timer::new(stringify!($it)),)+
                }
            }
        }

        impl<'a> $name<'a> {
            #[allow(dead_code)]
            pub fn report(&self) {
                $(self.$it.report();)+
            }
        }
    };
}

/// Measures the rest of the current scope with the specified [`Timer`].
#[macro_export]
macro_rules! time_scope {
    ($timer:expr) => {
        let _guard = $crate::perf::ScopeGuard::start(&mut $timer);
    };
}

/// Stops the borrowed timer when dropped. Created by [`time_scope!`].
pub struct ScopeGuard<'a, 'b>(&'b mut Timer<'a>);

impl<'a, 'b> ScopeGuard<'a, 'b> {
    pub fn start(timer: &'b mut Timer<'a>) -> Self {
        timer.start();
        ScopeGuard(timer)
    }
}

impl Drop for ScopeGuard<'_, '_> {
    fn drop(&mut self) {
        self.0.stop();
    }
}

#[cfg(test)]
mod tests {
    use crate::perf::Timer;
    use std::thread::sleep;
    use std::time::Duration;

    impl_timings!(Phases; first, second);

    #[test]
    fn timer_starts_empty() {
        let timer = Timer::new("load");

        assert_eq!(timer.name(), "load");
        assert_eq!(timer.runs(), 0);
        assert_eq!(timer.total(), Duration::default());
        assert_eq!(timer.average(), Duration::default());
    }

    #[test]
    fn timer_accumulates() {
        let mut timer = Timer::new("load");

        timer.start();
        sleep(Duration::from_millis(5));
        timer.stop();
        let first = timer.last();
        timer.start();
        timer.stop();

        assert_eq!(timer.runs(), 2);
        assert!(first >= Duration::from_millis(5));
        assert_eq!(timer.total(), first + timer.last());
    }

    #[test]
    fn scope_guard_stops_timer() {
        let mut phases = Phases::default();
        {
            time_scope!(phases.first);
            sleep(Duration::from_millis(1));
        }

        assert_eq!(phases.first.runs(), 1);
        assert_eq!(phases.second.runs(), 0);
        assert_eq!(phases.second.name(), "second");
        phases.report();
    }

    #[test]
    #[should_panic]
    fn double_start_panics() {
        let mut timer = Timer::new("load");
        timer.start();
        timer.start();
    }

    #[test]
    #[should_panic]
    fn stop_without_start_panics() {
        Timer::new("load").stop();
    }
}
