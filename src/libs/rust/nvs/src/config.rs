/*
 * Copyright (C) 2024 Nils Asmussen, Barkhausen Institut
 *
 * This file is part of M3 (Microkernel-based SysteM for Heterogeneous Manycores).
 *
 * M3 is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License version 2 as
 * published by the Free Software Foundation.
 *
 * M3 is distributed in the hope that it will be useful, but
 * WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the GNU
 * General Public License version 2 for more details.
 */

use base::cfg;
use base::errors::{Error, VerboseError};
use base::time::TimeDuration;
use base::util::parse;

use std::env;

/// The configuration of a [`Scheduler`](crate::Scheduler)
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SchedConfig {
    /// The timeslice of the default domain
    pub default_timeslice: TimeDuration,
    /// The preemption grace period of the default domain
    pub default_grace: TimeDuration,
    /// The wakeup interval of the worker while there is no active domain
    pub idle_poll: TimeDuration,
    /// The first wakeup of the worker after the scheduler has been opened
    pub initial_wakeup: TimeDuration,
    /// Whether a background worker ticks the scheduler
    pub run_worker: bool,
    /// The name of the worker thread
    pub worker_name: String,
}

impl Default for SchedConfig {
    fn default() -> Self {
        Self {
            default_timeslice: TimeDuration::from_nanos(cfg::DEFAULT_TIMESLICE_NS),
            default_grace: TimeDuration::from_nanos(cfg::DEFAULT_PREEMPT_GRACE_NS),
            idle_poll: TimeDuration::from_millis(cfg::SCHED_IDLE_POLL_MS),
            initial_wakeup: TimeDuration::from_millis(cfg::SCHED_INITIAL_WAKEUP_MS),
            run_worker: true,
            worker_name: cfg::SCHED_WORKER_NAME.to_string(),
        }
    }
}

impl SchedConfig {
    /// Creates the configuration from the defaults, overridden by the environment variables
    /// `NVS_TIMESLICE`, `NVS_GRACE`, `NVS_IDLE_POLL` (times like "100ms"), and `NVS_WORKER`
    /// (boolean)
    pub fn from_env() -> Result<Self, VerboseError> {
        Self::with_vars(|name| env::var(name).ok())
    }

    /// Creates the configuration from the defaults, overridden by the variables that `get` returns
    pub fn with_vars<F>(get: F) -> Result<Self, VerboseError>
    where
        F: Fn(&str) -> Option<String>,
    {
        fn apply<T, P>(
            get: &dyn Fn(&str) -> Option<String>,
            name: &str,
            parse: P,
            dst: &mut T,
        ) -> Result<(), VerboseError>
        where
            P: Fn(&str) -> Result<T, Error>,
        {
            if let Some(val) = get(name) {
                *dst = parse(&val).map_err(|e| {
                    VerboseError::new(e.code(), format!("Invalid value for {}: '{}'", name, val))
                })?;
            }
            Ok(())
        }

        let mut cfg = Self::default();
        apply(&get, "NVS_TIMESLICE", parse::time, &mut cfg.default_timeslice)?;
        apply(&get, "NVS_GRACE", parse::time, &mut cfg.default_grace)?;
        apply(&get, "NVS_IDLE_POLL", parse::time, &mut cfg.idle_poll)?;
        apply(&get, "NVS_WORKER", parse::bool, &mut cfg.run_worker)?;
        Ok(cfg)
    }
}
