use std::{
    collections::BTreeMap,
    time::{Duration, Instant},
};

use crate::floating_type_mod::FT;

#[derive(Clone)]
pub struct Counter<T> {
    values: Vec<T>,
    last_start: Instant,
}

impl<T> Counter<T> {
    fn new() -> Self {
        Counter::<T> {
            last_start: Instant::now(),
            values: Vec::new(),
        }
    }

    fn add_value(&mut self, v: T) {
        self.values.push(v);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }
}

impl Counter<FT> {
    pub fn avg(&self) -> FT {
        if self.values.is_empty() {
            return 0.;
        }
        self.values.iter().cloned().sum::<FT>() / self.values.len() as FT
    }
    pub fn min(&self) -> FT {
        self.values.iter().cloned().fold(FT::MAX, FT::min)
    }
    pub fn max(&self) -> FT {
        self.values.iter().cloned().fold(FT::MIN, FT::max)
    }
    pub fn sum(&self) -> FT {
        self.values.iter().cloned().sum::<FT>()
    }
}

impl Counter<Duration> {
    fn begin(&mut self) {
        self.last_start = Instant::now();
    }

    fn end(&mut self) {
        self.values.push(Instant::now() - self.last_start);
    }

    pub fn avg(&self) -> Duration {
        if self.values.is_empty() {
            return Duration::ZERO;
        }
        self.sum() / self.values.len() as u32
    }

    pub fn sum(&self) -> Duration {
        self.values.iter().cloned().sum::<Duration>()
    }
}

/// Samples of per-substep quantities (link count, recycled particles, ...).
pub struct ValueCounters {
    counters: BTreeMap<String, Counter<FT>>,
    enabled: bool,
}

impl ValueCounters {
    pub fn new(enabled: bool) -> ValueCounters {
        ValueCounters {
            counters: BTreeMap::new(),
            enabled,
        }
    }

    pub fn add_value(&mut self, id: &str, v: FT) {
        if self.enabled {
            self.counters
                .entry(id.to_string())
                .or_insert_with(Counter::<FT>::new)
                .add_value(v);
        }
    }

    pub fn get(&self, id: &str) -> Option<&Counter<FT>> {
        self.counters.get(id)
    }
}

/// Wall clock time of the simulation passes.
pub struct PerformanceCounters {
    counters: BTreeMap<String, Counter<Duration>>,
    enabled: bool,
}

impl PerformanceCounters {
    pub fn new(enabled: bool) -> PerformanceCounters {
        PerformanceCounters {
            counters: BTreeMap::new(),
            enabled,
        }
    }

    pub fn begin(&mut self, id: &str) {
        if self.enabled {
            self.counters
                .entry(id.to_string())
                .or_insert_with(Counter::<Duration>::new)
                .begin();
        }
    }

    pub fn end(&mut self, id: &str) {
        if self.enabled {
            if let Some(counter) = self.counters.get_mut(id) {
                counter.end();
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<&Counter<Duration>> {
        self.counters.get(id)
    }
}

/// Plain text summary: total and average time per pass, then min/max/avg of every value counter.
pub fn write_report(pcounters: &PerformanceCounters, vcounters: &ValueCounters) -> String {
    let mut s = String::new();

    if let Some(step) = pcounters.get("simulation-step") {
        s += &format!("simulation-time: {}ms\n", step.sum().as_secs_f64() * 1000.);
        s += &format!("substeps: {}\n\n", step.len());
    }

    for (label, pcounter) in &pcounters.counters {
        s += &format!("{}: avg:{}ms\n", label, pcounter.avg().as_secs_f64() * 1000.);
    }
    s += "\n";

    for (label, vcounter) in &vcounters.counters {
        s += &format!(
            "{}: min:{} max:{} avg:{}\n",
            label,
            vcounter.min(),
            vcounter.max(),
            vcounter.avg()
        );
    }

    s
}

#[test]
fn test_disabled_counters_record_nothing() {
    let mut p = PerformanceCounters::new(false);
    let mut v = ValueCounters::new(false);
    p.begin("x");
    p.end("x");
    v.add_value("y", 1.);
    assert!(p.get("x").is_none());
    assert!(v.get("y").is_none());
}

#[test]
fn test_report_lists_values() {
    let mut p = PerformanceCounters::new(true);
    let mut v = ValueCounters::new(true);
    p.begin("simulation-step");
    p.end("simulation-step");
    v.add_value("link-count", 2.);
    v.add_value("link-count", 4.);

    let counter = v.get("link-count").unwrap();
    assert_eq!(counter.avg(), 3.);
    assert_eq!(counter.min(), 2.);
    assert_eq!(counter.max(), 4.);

    let report = write_report(&p, &v);
    assert!(report.contains("substeps: 1"));
    assert!(report.contains("link-count: min:2 max:4 avg:3"));
}
