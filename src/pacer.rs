/*
 *  pacer.rs
 *
 *  LyMatrix - metrics in lights
 *	(c) 2020-26 Stuart Hunter
 *
 *	This program is free software: you can redistribute it and/or modify
 *	it under the terms of the GNU General Public License as published by
 *	the Free Software Foundation, either version 3 of the License, or
 *	(at your option) any later version.
 *
 *	This program is distributed in the hope that it will be useful,
 *	but WITHOUT ANY WARRANTY; without even the implied warranty of
 *	MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *	GNU General Public License for more details.
 *
 *	See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *	Public License.
 *
 */
use std::time::{Duration, Instant};

/// Minimum-interval gate. The first call always passes.
#[derive(Debug, Clone)]
pub struct Pacer {
    last: Option<Instant>,
    interval: Duration,
}

// serial modules cope with ~10 updates a second before the firmware
// starts dropping frames, keep the interval at or above that
impl Pacer {
    pub fn new(interval: Duration) -> Self {
        Self { last: None, interval }
    }

    #[inline]
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// True when at least `interval` has passed since the last mark.
    #[inline]
    pub fn is_due(&self) -> bool {
        match self.last {
            None => true,
            Some(t) => t.elapsed() >= self.interval,
        }
    }

    /// Record an accepted update now.
    #[inline]
    pub fn mark(&mut self) {
        self.last = Some(Instant::now());
    }

    /// Returns true if we should update now; if true, it also marks.
    #[inline]
    pub fn should_update(&mut self) -> bool {
        if self.is_due() {
            self.mark();
            true
        } else {
            false
        }
    }
}
