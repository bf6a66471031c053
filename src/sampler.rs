//! Fixed-rate and unthrottled sampling loops.

use core::fmt::Debug;
use std::io;
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{debug, trace, warn};

use crate::{
    angle::Angle,
    channel::RegisterBus,
    driver::{As5600, State},
    error::Error,
};

/// Default fixed sampling rate
pub const DEFAULT_RATE_HZ: f32 = 200.0;

/// Longest period a fixed-rate loop waits between reads
pub const MAX_PERIOD: Duration = Duration::from_secs(24 * 60 * 60);

/// Cloneable cancellation flag shared between a sampling loop and its owner
///
/// Cancelling wakes a loop blocked in its inter-sample sleep immediately.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<(Mutex<bool>, Condvar)>,
}

impl CancelToken {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation and wake any waiting loop
    pub fn cancel(&self) {
        let (flag, wake) = &*self.inner;
        *flag.lock().unwrap_or_else(PoisonError::into_inner) = true;
        wake.notify_all();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        let (flag, _) = &*self.inner;
        *flag.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Sleep until `deadline` or cancellation, whichever comes first
    ///
    /// Returns `true` if cancelled.
    pub fn sleep_until(&self, deadline: Instant) -> bool {
        let (flag, wake) = &*self.inner;
        let mut cancelled = flag.lock().unwrap_or_else(PoisonError::into_inner);
        loop {
            if *cancelled {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            cancelled = wake
                .wait_timeout(cancelled, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }
}

/// How the sampling loop is paced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pacing {
    /// One read per period; overruns start the next read immediately
    Fixed(Duration),
    /// Read again as soon as the previous read completes
    Unthrottled,
}

impl Pacing {
    /// Fixed-rate pacing at `rate_hz`
    ///
    /// Returns `None` unless the rate is finite and positive and its period
    /// is no longer than [`MAX_PERIOD`].
    #[must_use]
    pub fn from_hz(rate_hz: f32) -> Option<Self> {
        if !rate_hz.is_finite() || rate_hz <= 0.0 {
            return None;
        }
        Duration::try_from_secs_f64(1.0 / f64::from(rate_hz))
            .ok()
            .filter(|period| *period <= MAX_PERIOD)
            .map(Pacing::Fixed)
    }

    /// Fixed-rate pacing if a rate is given, unthrottled otherwise
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRate`] for a rate [`Self::from_hz`] rejects.
    pub fn try_from_rate<E>(rate_hz: Option<f32>) -> Result<Self, Error<E>> {
        match rate_hz {
            Some(hz) => Self::from_hz(hz).ok_or(Error::InvalidRate),
            None => Ok(Pacing::Unthrottled),
        }
    }

    /// Target period, if any
    #[must_use]
    pub fn period(&self) -> Option<Duration> {
        match self {
            Pacing::Fixed(period) => Some(*period),
            Pacing::Unthrottled => None,
        }
    }
}

impl Default for Pacing {
    fn default() -> Self {
        Pacing::Fixed(Duration::from_secs_f64(1.0 / f64::from(DEFAULT_RATE_HZ)))
    }
}

/// One delivered sample
#[derive(Debug, Clone, PartialEq)]
pub struct Sample<E> {
    /// Position in the stream, starting at 0 and increasing by one per read
    pub sequence: u64,
    /// When the read started
    pub timestamp: Instant,
    /// The angle, or the error that read produced
    pub reading: Result<Angle, Error<E>>,
}

/// Counters reported when a sampling loop ends by cancellation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    /// Samples delivered, including error samples
    pub samples: u64,
    /// Samples that carried an error
    pub errors: u64,
    /// Iterations that overran the period and skipped the sleep
    pub overruns: u64,
}

/// Absolute-deadline scheduler shared by every sampling surface
#[derive(Debug)]
struct Schedule {
    pacing: Pacing,
    next: Option<Instant>,
    sequence: u64,
}

impl Schedule {
    fn new(pacing: Pacing) -> Self {
        let pacing = match pacing {
            Pacing::Fixed(period) if period > MAX_PERIOD => {
                debug!("Capping sample period {period:?} to {MAX_PERIOD:?}");
                Pacing::Fixed(MAX_PERIOD)
            }
            other => other,
        };
        Self {
            pacing,
            next: None,
            sequence: 0,
        }
    }

    /// Wait for the next tick. Returns `None` if cancelled, otherwise
    /// whether the previous iteration overran.
    fn wait(&mut self, cancel: &CancelToken) -> Option<bool> {
        if cancel.is_cancelled() {
            return None;
        }
        let (Some(period), Some(next)) = (self.pacing.period(), self.next) else {
            return Some(false);
        };

        let now = Instant::now();
        if now < next {
            if cancel.sleep_until(next) {
                return None;
            }
            self.next = Some(next + period);
            Some(false)
        } else {
            trace!("Sample {} overran its period by {:?}", self.sequence, now - next);
            self.next = Some(now + period);
            Some(true)
        }
    }

    fn start(&mut self, timestamp: Instant) -> u64 {
        if let (Some(period), None) = (self.pacing.period(), self.next) {
            self.next = Some(timestamp + period);
        }
        let sequence = self.sequence;
        self.sequence += 1;
        sequence
    }
}

impl<C, E> As5600<C>
where
    C: RegisterBus<Error = E>,
    E: Debug,
{
    /// Sample the angle until `cancel` fires
    ///
    /// Each iteration reads the angle once and hands the result to
    /// `on_sample` on the calling thread, in read order. With
    /// [`Pacing::Fixed`] iterations start on an absolute schedule; when an
    /// iteration overruns its period the next one starts immediately and the
    /// schedule restarts from that point. Failed reads are delivered as
    /// error samples and the loop continues.
    ///
    /// Cancellation is checked before every read and interrupts the sleep
    /// between reads. A read already in flight always completes.
    ///
    /// # Errors
    ///
    /// - [`Error::ChannelClosed`] if the bus channel closes; the loop stops
    /// - [`Error::ContextClosed`] if the context was already closed
    pub fn run_sample_loop<F>(
        &mut self,
        pacing: Pacing,
        cancel: &CancelToken,
        mut on_sample: F,
    ) -> Result<LoopStats, Error<E>>
    where
        F: FnMut(Sample<E>),
    {
        if self.state() == State::Closed {
            return Err(Error::ContextClosed);
        }
        debug!("Sample loop starting ({pacing:?})");
        self.set_state(State::Sampling);

        let mut schedule = Schedule::new(pacing);
        let mut stats = LoopStats::default();
        let result = loop {
            match schedule.wait(cancel) {
                None => break Ok(stats),
                Some(true) => stats.overruns += 1,
                Some(false) => {}
            }

            let timestamp = Instant::now();
            let sequence = schedule.start(timestamp);
            let reading = match self.read_angle() {
                Err(err) if err.is_fatal() => {
                    warn!("Sample loop stopping after {} samples: {err}", stats.samples);
                    break Err(err);
                }
                Err(err) => {
                    debug!("Sample {sequence} failed: {err}");
                    stats.errors += 1;
                    Err(err)
                }
                ok => ok,
            };
            stats.samples += 1;
            on_sample(Sample {
                sequence,
                timestamp,
                reading,
            });
        };

        self.set_state(State::Open);
        debug!("Sample loop finished: {stats:?}");
        result
    }

    /// Blocking iterator over the same sample stream as
    /// [`Self::run_sample_loop`]
    ///
    /// The iterator ends when `cancel` fires. A fatal error is yielded once
    /// as the final item.
    pub fn samples<'a>(&'a mut self, pacing: Pacing, cancel: &'a CancelToken) -> Samples<'a, C> {
        self.set_state(State::Sampling);
        Samples {
            encoder: self,
            cancel,
            schedule: Schedule::new(pacing),
            finished: false,
        }
    }
}

/// Iterator returned by [`As5600::samples`]
#[derive(Debug)]
pub struct Samples<'a, C>
where
    C: RegisterBus,
{
    encoder: &'a mut As5600<C>,
    cancel: &'a CancelToken,
    schedule: Schedule,
    finished: bool,
}

impl<C, E> Iterator for Samples<'_, C>
where
    C: RegisterBus<Error = E>,
    E: Debug,
{
    type Item = Sample<E>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        if self.encoder.state() == State::Closed {
            self.finished = true;
            return Some(Sample {
                sequence: self.schedule.sequence,
                timestamp: Instant::now(),
                reading: Err(Error::ContextClosed),
            });
        }
        if self.schedule.wait(self.cancel).is_none() {
            self.finished = true;
            return None;
        }

        let timestamp = Instant::now();
        let sequence = self.schedule.start(timestamp);
        let reading = self.encoder.read_angle();
        if reading.as_ref().is_err_and(Error::is_fatal) {
            self.finished = true;
        }
        Some(Sample {
            sequence,
            timestamp,
            reading,
        })
    }
}

impl<C> Drop for Samples<'_, C>
where
    C: RegisterBus,
{
    fn drop(&mut self) {
        self.encoder.set_state(State::Open);
    }
}

/// Handle to a sampling loop running on its own thread
///
/// Dropping the handle cancels the loop without waiting for it.
#[derive(Debug)]
pub struct SamplerHandle<C, E> {
    cancel: CancelToken,
    thread: Option<JoinHandle<(As5600<C>, Result<LoopStats, Error<E>>)>>,
}

impl<C, E> SamplerHandle<C, E>
where
    C: RegisterBus<Error = E>,
    E: Debug,
{
    /// Token controlling the loop
    #[must_use]
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Ask the loop to stop
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Whether the loop has exited
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.thread.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Cancel the loop, wait for it, and hand the context back
    ///
    /// # Panics
    ///
    /// Re-raises a panic from the `on_sample` callback.
    pub fn join(mut self) -> (As5600<C>, Result<LoopStats, Error<E>>) {
        self.cancel.cancel();
        let thread = self.thread.take();
        match thread.map(JoinHandle::join) {
            Some(Ok(output)) => output,
            Some(Err(panic)) => std::panic::resume_unwind(panic),
            None => unreachable!("sampler thread joined twice"),
        }
    }

    /// Stop the loop and close the context, releasing the bus handle
    ///
    /// # Errors
    ///
    /// Returns the loop's terminal error, if it ended with one.
    pub fn close(self) -> Result<LoopStats, Error<E>> {
        let (mut encoder, result) = self.join();
        encoder.close();
        result
    }
}

impl<C, E> Drop for SamplerHandle<C, E> {
    fn drop(&mut self) {
        if self.thread.is_some() {
            self.cancel.cancel();
        }
    }
}

impl<C, E> As5600<C>
where
    C: RegisterBus<Error = E> + Send + 'static,
    E: Debug + Send + 'static,
{
    /// Move the context onto a dedicated thread running
    /// [`Self::run_sample_loop`]
    ///
    /// `on_sample` runs on that thread, in read order.
    ///
    /// # Errors
    ///
    /// Returns the spawn error if the thread cannot be created; the context
    /// is dropped and its bus handle released.
    pub fn spawn_sampler<F>(self, pacing: Pacing, mut on_sample: F) -> io::Result<SamplerHandle<C, E>>
    where
        F: FnMut(Sample<E>) + Send + 'static,
    {
        let cancel = CancelToken::new();
        let token = cancel.clone();
        let mut encoder = self;

        let thread = thread::Builder::new()
            .name("as5600-sampler".into())
            .spawn(move || {
                let result = encoder.run_sample_loop(pacing, &token, &mut on_sample);
                (encoder, result)
            })?;

        Ok(SamplerHandle {
            cancel,
            thread: Some(thread),
        })
    }
}
