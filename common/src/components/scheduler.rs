// Copyright (c) 2024 Leela Aurelia, git@elia.garden
//
// Unless otherwise noted, this file is released and thus subject to the
// terms of the Mozilla Public License Version 2.0 (MPL-2.0) or the
// GNU General Public License Version 3 (GPL-3).
// If a copy of these licenses was not distributed with this file, you can
// obtain them at https://mozilla.org/MPL/2.0/ and http://www.gnu.org/licenses/.

/// Type for unsigned time, in system ticks
pub type Time = u64;
/// Type for signed time, in system ticks
pub type TimeS = i64;

/// A scheduler used by the emulation cores to pace peripherals.
/// It is generic over the possible events and keeps them in a flat
/// vector sorted by descending deadline, so the soonest event sits
/// at the end and can be popped cheaply.
///
/// Events that share a deadline are handed out in the order they were
/// scheduled, and they observe the side effects of the events that ran
/// before them.
#[derive(Default)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Scheduler<E: Kind> {
    /// Current time of the scheduler, in global cycles.
    time: Time,
    /// Time of the next event.
    next: Time,
    /// Events currently awaiting execution.
    #[cfg_attr(feature = "serde", serde(bound = ""))]
    events: Vec<ScheduledEvent<E>>,
}

impl<E: Kind> Scheduler<E> {
    /// Schedule an event of the given kind after the given amount
    /// of cycles have elapsed from now.
    pub fn schedule(&mut self, kind: E, after: Time) {
        let time = self.time + after;
        let event = ScheduledEvent {
            kind,
            execute_at: time,
        };
        self.events.push(event);

        // Ensure the event list is still sorted
        // (Swap the new element further back until it is in the right spot)
        // An equal deadline also swaps, so that of two events due at the
        // same time, the one scheduled first is popped first.
        for idx in (1..self.events.len()).rev() {
            let other = self.events[idx - 1];
            if time >= other.execute_at {
                self.events[idx] = other;
            } else {
                self.events[idx] = event;
                self.next = self.events.last().unwrap().execute_at;
                return;
            }
        }
        // The loop exited without finding a bigger element, this new one is the biggest
        self.events[0] = event;
        self.next = self
            .events
            .last()
            .map(|e| e.execute_at)
            .unwrap_or(Time::MAX);
    }

    /// Move the cursor to the given time. The frame drivers own the
    /// cursor and occasionally move it backwards, when a CPU overshot
    /// the deadline of the event it is about to service.
    #[inline]
    pub fn jump_to(&mut self, time: Time) {
        self.time = time;
    }

    /// Get the next pending event. If there are no events ready, returns None.
    /// Note that this implementation assumes there is always at least one event
    /// scheduled.
    #[inline]
    pub fn get_next_pending(&mut self) -> Option<Event<E>> {
        if self.next <= self.time {
            let idx = self.events.len() - 1;
            let event = self.events[idx];
            self.events.truncate(idx);
            self.next = self
                .events
                .last()
                .map(|e| e.execute_at)
                .unwrap_or(Time::MAX);
            Some(Event {
                kind: event.kind,
                late_by: (self.time - event.execute_at) as TimeS,
            })
        } else {
            None
        }
    }

    /// Cancel all events of a given type.
    /// Somewhat expensive; remaining events keep their relative order.
    pub fn cancel(&mut self, evt: E) {
        self.events.retain(|e| e.kind != evt);
        self.next = self
            .events
            .last()
            .map(|e| e.execute_at)
            .unwrap_or(Time::MAX);
    }

    /// Rebase the cursor to zero, subtracting the current time from
    /// every queued deadline. The offset of every event to the cursor
    /// is unchanged; callers are expected to adjust any cycle counters
    /// they keep next to the scheduler in the same step.
    pub fn rebase(&mut self) {
        for event in &mut self.events {
            event.execute_at = event.execute_at.saturating_sub(self.time);
        }
        self.time = 0;
        self.next = self
            .events
            .last()
            .map(|e| e.execute_at)
            .unwrap_or(Time::MAX);
    }

    /// Deadline of the soonest queued event, `Time::MAX` when empty.
    #[inline]
    pub fn next_due(&self) -> Time {
        self.next
    }

    #[inline]
    pub fn now(&self) -> Time {
        self.time
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

/// An event awaiting execution
#[derive(Copy, Clone)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
struct ScheduledEvent<E: Kind> {
    /// Kind of event to execute
    #[cfg_attr(feature = "serde", serde(bound = ""))]
    kind: E,
    /// Time of the scheduler to execute it at
    execute_at: Time,
}

/// Trait for event kinds.
#[cfg(feature = "serde")]
pub trait Kind:
    for<'de> serde::Deserialize<'de> + serde::Serialize + PartialEq + Copy + Clone
{
}
#[cfg(not(feature = "serde"))]
pub trait Kind: PartialEq + Copy + Clone {}

/// Event that is ready to be handled.
#[derive(Copy, Clone)]
#[cfg_attr(test, derive(Debug, PartialEq))]
pub struct Event<E: Kind> {
    /// The kind of event to handle
    pub kind: E,
    /// By how many ticks the event was delayed by. For example:
    /// - Event was scheduled to be executed at tick 1000
    /// - Scheduler ran until 1010 before the event got handled
    /// - `late_by` will be 1010 - 1000 = 10.
    pub late_by: TimeS,
}
