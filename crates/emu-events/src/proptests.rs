use std::cmp::Reverse;

use proptest::prelude::*;
use proptest::test_runner::TestCaseResult;

use crate::{Event, EventKind, Payload, Priority, PriorityHeap};

const CAPACITY: usize = 24;
const MAX_OPS: usize = 128;
const HIGH_WATER: f32 = 0.8;
const BACKOFF: u64 = 50;

#[derive(Debug, Clone)]
enum Op {
    Push {
        kind: EventKind,
        priority: Priority,
        delay: u64,
    },
    Pop,
    Advance(u64),
    Cancel(EventKind),
    Adapt(f32),
    Purge,
}

#[derive(Debug, Clone)]
struct ModelItem {
    id: u32,
    kind: EventKind,
    priority: Priority,
    due: u64,
    canceled: bool,
}

impl ModelItem {
    fn rank(&self) -> (Priority, Reverse<u64>) {
        (self.priority, Reverse(self.due))
    }

    fn is_ready(&self, now: u64) -> bool {
        !self.canceled && self.due <= now
    }
}

fn kind_strategy() -> impl Strategy<Value = EventKind> {
    // A handful of kinds keeps cancellation hitting multiple items.
    prop_oneof![
        Just(EventKind::FrameStart),
        Just(EventKind::VBlank),
        Just(EventKind::HBlank),
        Just(EventKind::CpuStep),
    ]
}

fn priority_strategy() -> impl Strategy<Value = Priority> {
    prop::sample::select(Priority::ALL.to_vec())
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        6 => (kind_strategy(), priority_strategy(), prop_oneof![Just(0u64), 0u64..200])
            .prop_map(|(kind, priority, delay)| Op::Push { kind, priority, delay }),
        4 => Just(Op::Pop),
        2 => (1u64..80).prop_map(Op::Advance),
        1 => kind_strategy().prop_map(Op::Cancel),
        1 => prop_oneof![Just(0.5f32), Just(0.95f32), 0.0f32..1.0f32].prop_map(Op::Adapt),
        1 => Just(Op::Purge),
    ]
}

fn payload_id(event: &Event) -> u32 {
    let bytes = event.owned_bytes().expect("test events carry an id payload");
    u32::from_le_bytes(bytes.try_into().expect("4-byte id"))
}

fn run_ops(ops: &[Op]) -> TestCaseResult {
    let mut heap = PriorityHeap::new(CAPACITY).unwrap();
    let mut model: Vec<ModelItem> = Vec::new();
    let mut now = 0u64;
    let mut next_id = 0u32;

    for op in ops {
        match op {
            Op::Push {
                kind,
                priority,
                delay,
            } => {
                let id = next_id;
                next_id += 1;
                let event = Event::new(*kind, now)
                    .with_payload(Payload::Owned(id.to_le_bytes().to_vec().into_boxed_slice()));
                let res = heap.push(event, *priority, *delay);
                if model.len() == CAPACITY {
                    prop_assert!(res.is_err());
                } else {
                    prop_assert!(res.is_ok());
                    model.push(ModelItem {
                        id,
                        kind: *kind,
                        priority: *priority,
                        due: now + delay,
                        canceled: false,
                    });
                }
            }
            Op::Pop => {
                let best = model
                    .iter()
                    .filter(|item| item.is_ready(now))
                    .map(ModelItem::rank)
                    .max();
                let popped = heap.pop();
                match (best, popped) {
                    (None, None) => {}
                    (Some(best), Some(event)) => {
                        let id = payload_id(&event);
                        let pos = model.iter().position(|item| item.id == id);
                        prop_assert!(pos.is_some(), "popped unknown id {}", id);
                        let item = model.remove(pos.unwrap());
                        prop_assert!(item.is_ready(now));
                        prop_assert_eq!(item.rank(), best);
                        prop_assert_eq!(event.kind, item.kind);
                    }
                    (best, popped) => {
                        prop_assert!(false, "model={:?} heap={:?}", best, popped);
                    }
                }
            }
            Op::Advance(delta) => {
                now += delta;
                heap.update(now);
            }
            Op::Cancel(kind) => {
                let mut expected = false;
                for item in model.iter_mut() {
                    if !item.canceled && item.kind == *kind {
                        item.canceled = true;
                        expected = true;
                    }
                }
                prop_assert_eq!(heap.cancel(*kind, None), expected);
            }
            Op::Adapt(load) => {
                let adapted = *load > HIGH_WATER;
                if adapted {
                    for item in model.iter_mut() {
                        match item.priority {
                            Priority::Low => item.due += BACKOFF,
                            Priority::Critical => item.due = item.due.min(now),
                            _ => {}
                        }
                    }
                }
                prop_assert_eq!(heap.adapt_priorities(*load), adapted);
            }
            Op::Purge => {
                let canceled = model.iter().filter(|item| item.canceled).count();
                model.retain(|item| !item.canceled);
                prop_assert_eq!(heap.purge(), canceled);
            }
        }

        prop_assert!(heap.is_heap_ordered());
        prop_assert_eq!(heap.occupancy(), model.len());
        prop_assert_eq!(
            heap.size(),
            model.iter().filter(|item| !item.canceled).count()
        );
        prop_assert!(heap.occupancy() <= heap.capacity());
    }

    Ok(())
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 128,
        .. ProptestConfig::default()
    })]

    #[test]
    fn heap_matches_reference_model(ops in prop::collection::vec(op_strategy(), 1..MAX_OPS)) {
        run_ops(&ops)?;
    }

    #[test]
    fn drains_in_rank_order_once_everything_is_due(
        entries in prop::collection::vec((priority_strategy(), 0u64..1_000), 1..CAPACITY),
    ) {
        let mut heap = PriorityHeap::new(CAPACITY).unwrap();
        for (priority, delay) in &entries {
            heap.push(Event::new(EventKind::CpuStep, 0), *priority, *delay).unwrap();
        }
        heap.update(1_000);

        let mut previous: Option<(Priority, Reverse<u64>)> = None;
        while let Some(item) = heap.pop_item() {
            let rank = (item.priority(), Reverse(item.due()));
            if let Some(previous) = previous {
                prop_assert!(previous >= rank);
            }
            previous = Some(rank);
        }
        prop_assert_eq!(heap.occupancy(), 0);
    }
}
