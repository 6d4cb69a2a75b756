//! DAG-invariant property tests for `GraphStore::add_edge` (spec §3
//! invariants 2 and 3: a flow stays acyclic, and every input port is
//! connected at most once), exercised over randomly generated chain
//! lengths and edge-insertion orders rather than a handful of fixed flows.

use flowfile_graph::GraphStore;
use flowfile_registry::NodeRegistry;
use flowfile_types::{Edge, FlowfileError, Port, Position};
use proptest::prelude::*;
use std::sync::Arc;

fn run<F: std::future::Future>(fut: F) -> F::Output {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
        .block_on(fut)
}

fn store() -> GraphStore {
    GraphStore::new(Arc::new(NodeRegistry::built_in()))
}

proptest! {
    /// A linear chain `n0 -> n1 -> ... -> n_{k-1}` can always be built
    /// regardless of the order edges are added in, and adding any edge
    /// that points back up the chain is always rejected as a cycle.
    #[test]
    fn chains_build_in_any_order_and_stay_acyclic(
        len in 3usize..8,
        shuffle_seed in any::<u64>(),
        back_from in 0usize..8,
        back_to in 0usize..8,
    ) {
        run(async {
            let store = store();
            let flow_id = store.create_flow("chain").await;
            let mut nodes = Vec::with_capacity(len);
            for i in 0..len {
                let kind = if i == 0 { "manual_input" } else { "select" };
                let node = store
                    .add_node(flow_id, kind, Position { x: i as f64, y: 0.0 })
                    .await
                    .unwrap();
                nodes.push(node);
            }

            let mut order: Vec<usize> = (0..len - 1).collect();
            // Deterministic shuffle from the proptest-supplied seed, Fisher-Yates.
            let mut state = shuffle_seed;
            for i in (1..order.len()).rev() {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
                let j = (state >> 33) as usize % (i + 1);
                order.swap(i, j);
            }

            for i in order {
                store
                    .add_edge(
                        flow_id,
                        Edge::new(nodes[i], Port::Output(0), nodes[i + 1], Port::Input(0)),
                    )
                    .await
                    .unwrap();
            }

            let from = back_from % len;
            let to = back_to % len;
            prop_assume!(from != to);
            let result = store
                .add_edge(
                    flow_id,
                    Edge::new(nodes[from], Port::Output(0), nodes[to], Port::Input(0)),
                )
                .await;
            // Forward edges beyond the immediate chain link, or the
            // already-present link itself, are rejected for other reasons
            // (port already connected); only a strictly backward edge is
            // guaranteed to be a cycle. Restrict the assertion to that case.
            if from > to {
                let is_validation_err = matches!(result, Err(FlowfileError::Validation { .. }));
                prop_assert!(is_validation_err);
            }
            Ok(())
        })?;
    }

    /// Once any edge targets `(node, port)`, every other edge aimed at the
    /// same input port is rejected, regardless of its source.
    #[test]
    fn an_input_port_accepts_at_most_one_inbound_edge(extra_sources in 1usize..4) {
        run(async {
            let store = store();
            let flow_id = store.create_flow("fan_in").await;
            let sink = store
                .add_node(flow_id, "select", Position { x: 0.0, y: 0.0 })
                .await
                .unwrap();

            let mut sources = Vec::with_capacity(extra_sources + 1);
            for i in 0..extra_sources + 1 {
                sources.push(
                    store
                        .add_node(flow_id, "manual_input", Position { x: 1.0, y: i as f64 })
                        .await
                        .unwrap(),
                );
            }

            store
                .add_edge(flow_id, Edge::new(sources[0], Port::Output(0), sink, Port::Input(0)))
                .await
                .unwrap();

            for &source in &sources[1..] {
                let err = store
                    .add_edge(flow_id, Edge::new(source, Port::Output(0), sink, Port::Input(0)))
                    .await
                    .unwrap_err();
                let is_validation_err = matches!(err, FlowfileError::Validation { .. });
                prop_assert!(is_validation_err);
            }
            Ok(())
        })?;
    }
}
