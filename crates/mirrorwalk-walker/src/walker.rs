//! The recursive graph walker.

use crate::error::WalkResult;
use crate::options::WalkOptions;
use crate::progress::{HeartbeatLog, ProgressSlot, ProgressState};
use crate::run::RunGroupPlan;
use mirrorwalk_core::{
    AncestorPath, Key, Metadata, MirrorNode, ObjectId, ObjectSource, Scalar, ValueClass,
};
use std::io::{self, Write};
use std::time::Instant;
use tracing::debug;

/// Recursive traverser producing a mirror tree while streaming a textual
/// transcript.
///
/// Cycle detection, depth limiting and run-grouping are independent and
/// composable. Transcript text is appended incrementally as children are
/// processed, never buffered as one in-memory string, so a crash mid-walk
/// still leaves a readable partial transcript.
pub struct GraphWalker<'s, W: Write> {
    source: &'s dyn ObjectSource,
    transcript: W,
    heartbeat: Option<HeartbeatLog>,
    options: WalkOptions,
    /// Non-zero while walking a run-group representative, whose transcript
    /// rendering is the single run line emitted by its parent.
    quiet: u32,
}

impl<'s, W: Write> GraphWalker<'s, W> {
    pub fn new(source: &'s dyn ObjectSource, transcript: W, options: WalkOptions) -> Self {
        Self {
            source,
            transcript,
            heartbeat: None,
            options,
            quiet: 0,
        }
    }

    /// Attach a heartbeat log; progress is reported only when one is set.
    pub fn with_heartbeat(mut self, heartbeat: HeartbeatLog) -> Self {
        self.heartbeat = Some(heartbeat);
        self
    }

    /// Walk the graph from `root`, returning the mirror tree.
    pub fn walk(&mut self, root: ObjectId) -> WalkResult<MirrorNode> {
        let class = self.source.classify(root)?;
        let plan = if class == ValueClass::Sequence {
            RunGroupPlan::for_sequence(self.source, root, self.options.run_threshold)
        } else {
            None
        };
        let slot = self.heartbeat.as_ref().map(|_| ProgressSlot::root());
        let node = self.walk_value(root, None, &AncestorPath::new(), 0, plan.as_ref(), slot)?;
        self.transcript.flush()?;
        Ok(node)
    }

    /// Reclaim the transcript sink and heartbeat log after a walk.
    pub fn into_parts(self) -> (W, Option<HeartbeatLog>) {
        (self.transcript, self.heartbeat)
    }

    fn walk_value(
        &mut self,
        id: ObjectId,
        key: Option<&Key>,
        ancestors: &AncestorPath,
        depth: usize,
        plan: Option<&RunGroupPlan>,
        slot: Option<ProgressSlot>,
    ) -> WalkResult<MirrorNode> {
        let mut progress = slot.map(ProgressState::begin);
        let class = self.source.classify(id)?;

        let node = match class {
            ValueClass::Scalar => {
                let value = self.source.try_scalar(id).unwrap_or(Scalar::Null);
                self.emit_line(
                    depth,
                    &format!(
                        "{}<{}>: {}{}",
                        key_prefix(key),
                        value.type_name(),
                        value,
                        comma(depth)
                    ),
                )?;
                MirrorNode::Scalar(value)
            }
            ValueClass::Opaque => self.walk_opaque(id, key, depth)?,
            ValueClass::Sequence | ValueClass::Mapping => {
                self.walk_container(id, key, class, ancestors, depth, plan, &mut progress)?
            }
        };

        if let (Some(hb), Some(state)) = (self.heartbeat.as_mut(), progress.as_ref()) {
            hb.on_leave(state, &describe(key, &node));
        }
        Ok(node)
    }

    fn walk_opaque(
        &mut self,
        id: ObjectId,
        key: Option<&Key>,
        depth: usize,
    ) -> WalkResult<MirrorNode> {
        let display = self
            .source
            .try_display(id)
            .unwrap_or_else(|| format!("opaque{id}"));
        let label = self
            .source
            .try_type_label(id)
            .unwrap_or_else(|| "opaque".to_string());
        self.emit_line(
            depth,
            &format!("{}<{label}>: {display}{}", key_prefix(key), comma(depth)),
        )?;
        Ok(MirrorNode::Opaque { display })
    }

    fn walk_container(
        &mut self,
        id: ObjectId,
        key: Option<&Key>,
        class: ValueClass,
        ancestors: &AncestorPath,
        depth: usize,
        plan: Option<&RunGroupPlan>,
        progress: &mut Option<ProgressState>,
    ) -> WalkResult<MirrorNode> {
        let started = Instant::now();

        // A value that classifies as a container but cannot enumerate its
        // contents is an opaque handle; never recurse into it.
        let Some(children) = self.source.try_children(id) else {
            return self.walk_opaque(id, key, depth);
        };

        let path = ancestors.entered(id, depth);
        let label = self.container_label(id, class, children.len());
        if let (Some(hb), Some(state)) = (self.heartbeat.as_mut(), progress.as_ref()) {
            hb.on_enter(state, &label);
        }

        let open = if class == ValueClass::Sequence { "[" } else { "{" };
        self.emit_line(depth, &format!("{}<{label}>: {open}", key_prefix(key)))?;

        let total = children.len();
        let mut seq_children = Vec::new();
        let mut map_entries: Vec<(Key, MirrorNode)> = Vec::new();

        let mut i = 0;
        while i < total {
            // Run-group plans only exist for sequence-shaped nodes.
            if let Some(count) = plan.and_then(|p| p.run_at(i)) {
                let child = children[i].1;
                self.quiet += 1;
                let representative = self.walk_child(None, child, &path, depth, None);
                self.quiet -= 1;
                let representative = representative?;
                self.emit_line(depth + 1, &format!("{count}x({}),", run_body(&representative)))?;
                seq_children.push(MirrorNode::RunGroup {
                    count,
                    value: Box::new(representative),
                });
                i += count as usize;
                continue;
            }

            let (child_key, child) = &children[i];
            let slot = progress
                .as_ref()
                .and_then(|state| ProgressSlot::child(state, i + 1, total));
            let node = self.walk_child(Some(child_key), *child, &path, depth, slot)?;
            if class == ValueClass::Sequence {
                seq_children.push(node);
            } else {
                map_entries.push((child_key.clone(), node));
            }

            if let (Some(hb), Some(state)) = (self.heartbeat.as_mut(), progress.as_mut()) {
                hb.beat_if_due(state, &label);
            }
            i += 1;
        }

        let close = if class == ValueClass::Sequence { "]" } else { "}" };
        self.emit_line(depth, &format!("{close}{}", comma(depth)))?;

        let mut meta = Metadata {
            label,
            key_order: map_entries.iter().map(|(k, _)| k.clone()).collect(),
            slow_subtree: false,
            display: self.source.try_display(id),
        };
        if started.elapsed() >= self.options.slow_budget() {
            debug!(%id, label = %meta.label, "subtree exceeded time budget, flagging slow");
            meta.slow_subtree = true;
        }

        Ok(if class == ValueClass::Sequence {
            MirrorNode::Sequence {
                len: self.source.sequence_len(id).unwrap_or(total as u64),
                children: seq_children,
                meta,
            }
        } else {
            MirrorNode::Mapping {
                entries: map_entries,
                meta,
            }
        })
    }

    /// Per-child dispatch: recursion marker, truncation marker, or recurse.
    fn walk_child(
        &mut self,
        key: Option<&Key>,
        child: ObjectId,
        path: &AncestorPath,
        parent_depth: usize,
        slot: Option<ProgressSlot>,
    ) -> WalkResult<MirrorNode> {
        let depth = parent_depth + 1;

        if let Some(seen_at) = path.depth_of(child) {
            let offset = (depth - seen_at) as u32;
            self.emit_line(
                depth,
                &format!("{}<recursion>: ^{offset},", key_prefix(key)),
            )?;
            return Ok(MirrorNode::Recursion {
                identity: child,
                offset,
            });
        }

        let class = self.source.classify(child)?;
        let container = matches!(class, ValueClass::Sequence | ValueClass::Mapping);
        if container && parent_depth >= self.options.max_depth {
            let display = self
                .source
                .try_display(child)
                .or_else(|| self.source.try_type_label(child))
                .unwrap_or_else(|| class.generic_label().to_string());
            let ident = self.source.try_identifier(child);
            let marker = match &ident {
                Some(idv) => format!("<truncated id={idv}>"),
                None => "<truncated>".to_string(),
            };
            self.emit_line(
                depth,
                &format!("{}<{display}>: {marker},", key_prefix(key)),
            )?;
            return Ok(MirrorNode::Truncated { display, ident });
        }

        let child_plan = if class == ValueClass::Sequence {
            RunGroupPlan::for_sequence(self.source, child, self.options.run_threshold)
        } else {
            None
        };
        self.walk_value(child, key, path, depth, child_plan.as_ref(), slot)
    }

    fn container_label(&self, id: ObjectId, class: ValueClass, child_count: usize) -> String {
        let base = self
            .source
            .try_type_label(id)
            .unwrap_or_else(|| class.generic_label().to_string());
        // Labels lifted from decoded trees may already carry a bracketed
        // annotation; leave those alone.
        if class == ValueClass::Sequence && !base.ends_with(']') {
            let len = self.source.sequence_len(id).unwrap_or(child_count as u64);
            format!("{base}[{len}]")
        } else {
            base
        }
    }

    fn emit_line(&mut self, depth: usize, text: &str) -> io::Result<()> {
        if self.quiet > 0 {
            return Ok(());
        }
        for _ in 0..depth {
            self.transcript.write_all(b"  ")?;
        }
        self.transcript.write_all(text.as_bytes())?;
        self.transcript.write_all(b"\n")
    }
}

fn key_prefix(key: Option<&Key>) -> String {
    match key {
        Some(k) => format!("{k} "),
        None => String::new(),
    }
}

fn comma(depth: usize) -> &'static str {
    if depth == 0 {
        ""
    } else {
        ","
    }
}

/// Body of a run-group transcript line: `<type>: <value>`.
fn run_body(node: &MirrorNode) -> String {
    match node {
        MirrorNode::Scalar(s) => format!("{}: {}", s.type_name(), s),
        other => format!("opaque: {}", other.display_string()),
    }
}

/// Label for a heartbeat line: the key if the node has one, else its own
/// label or display form.
fn describe(key: Option<&Key>, node: &MirrorNode) -> String {
    match key {
        Some(k) => k.to_string(),
        None => node
            .metadata()
            .map(|m| m.label.clone())
            .unwrap_or_else(|| node.display_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::HeartbeatThresholds;
    use mirrorwalk_core::MemoryGraph;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl SharedBuf {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn walk_to_string(graph: &MemoryGraph, root: ObjectId, options: WalkOptions) -> (MirrorNode, String) {
        let mut walker = GraphWalker::new(graph, Vec::new(), options);
        let node = walker.walk(root).unwrap();
        let (buf, _) = walker.into_parts();
        (node, String::from_utf8(buf).unwrap())
    }

    fn entry<'a>(node: &'a MirrorNode, key: &str) -> &'a MirrorNode {
        match node {
            MirrorNode::Mapping { entries, .. } => entries
                .iter()
                .find(|(k, _)| matches!(k, Key::Str(s) if s == key))
                .map(|(_, n)| n)
                .unwrap_or_else(|| panic!("missing key {key}")),
            _ => panic!("not a mapping"),
        }
    }

    #[test]
    fn test_scalar_and_string_rendering() {
        let mut graph = MemoryGraph::new();
        let root = graph.mapping(Some("Config"));
        let name = graph.string("bob");
        let port = graph.int(8080);
        graph.insert(root, Key::Str("name".into()), name);
        graph.insert(root, Key::Str("port".into()), port);

        let (node, text) = walk_to_string(&graph, root, WalkOptions::default());
        assert!(text.contains("<Config>: {"));
        assert!(text.contains("  name <string>: \"bob\","));
        assert!(text.contains("  port <number>: 8080,"));
        assert!(text.ends_with("}\n"));

        let meta = node.metadata().unwrap();
        assert_eq!(meta.label, "Config");
        assert_eq!(
            meta.key_order,
            vec![Key::Str("name".into()), Key::Str("port".into())]
        );
    }

    #[test]
    fn test_cycle_produces_single_recursion_marker() {
        let mut graph = MemoryGraph::new();
        let root = graph.mapping(None);
        let child = graph.mapping(None);
        graph.insert(root, Key::Str("child".into()), child);
        graph.insert(child, Key::Str("back".into()), root);

        let (node, text) = walk_to_string(&graph, root, WalkOptions::default());
        let back = entry(entry(&node, "child"), "back");
        assert_eq!(
            *back,
            MirrorNode::Recursion {
                identity: root,
                offset: 2
            }
        );
        assert_eq!(text.matches("<recursion>").count(), 1);
        assert!(text.contains("back <recursion>: ^2,"));
    }

    #[test]
    fn test_shared_value_is_not_a_cycle() {
        let mut graph = MemoryGraph::new();
        let root = graph.mapping(None);
        let shared = graph.mapping(Some("Shared"));
        graph.insert(root, Key::Str("a".into()), shared);
        graph.insert(root, Key::Str("b".into()), shared);

        let (node, text) = walk_to_string(&graph, root, WalkOptions::default());
        assert!(entry(&node, "a").is_container());
        assert!(entry(&node, "b").is_container());
        assert!(!text.contains("<recursion>"));
    }

    #[test]
    fn test_self_reference_offset_is_one() {
        let mut graph = MemoryGraph::new();
        let root = graph.mapping(None);
        graph.insert(root, Key::Str("me".into()), root);

        let (node, _) = walk_to_string(&graph, root, WalkOptions::default());
        assert_eq!(
            *entry(&node, "me"),
            MirrorNode::Recursion {
                identity: root,
                offset: 1
            }
        );
    }

    #[test]
    fn test_depth_truncation() {
        let mut graph = MemoryGraph::new();
        let root = graph.mapping(None);
        let a = graph.mapping(None);
        let b = graph.mapping(None);
        let c = graph.mapping(Some("Widget"));
        let c_id = graph.int(42);
        graph.insert(root, Key::Str("a".into()), a);
        graph.insert(a, Key::Str("b".into()), b);
        graph.insert(b, Key::Str("c".into()), c);
        graph.insert(c, Key::Str("id".into()), c_id);

        let options = WalkOptions {
            max_depth: 2,
            ..Default::default()
        };
        let (node, text) = walk_to_string(&graph, root, options);
        let truncated = entry(entry(entry(&node, "a"), "b"), "c");
        assert_eq!(
            *truncated,
            MirrorNode::Truncated {
                display: "Widget".into(),
                ident: Some(Scalar::Int(42)),
            }
        );
        assert!(text.contains("c <Widget>: <truncated id=42>,"));
    }

    #[test]
    fn test_scalars_survive_at_max_depth() {
        let mut graph = MemoryGraph::new();
        let root = graph.mapping(None);
        let inner = graph.mapping(None);
        let leaf = graph.int(1);
        graph.insert(root, Key::Str("inner".into()), inner);
        graph.insert(inner, Key::Str("leaf".into()), leaf);

        let options = WalkOptions {
            max_depth: 1,
            ..Default::default()
        };
        let (node, _) = walk_to_string(&graph, root, options);
        assert_eq!(
            *entry(entry(&node, "inner"), "leaf"),
            MirrorNode::Scalar(Scalar::Int(1))
        );
    }

    #[test]
    fn test_run_grouping_collapses_long_runs() {
        let mut graph = MemoryGraph::new();
        let seq = graph.sequence(None);
        for _ in 0..150 {
            let five = graph.int(5);
            graph.push_item(seq, five);
        }
        let seven = graph.int(7);
        graph.push_item(seq, seven);

        let (node, text) = walk_to_string(&graph, seq, WalkOptions::default());
        match &node {
            MirrorNode::Sequence { len, children, .. } => {
                assert_eq!(*len, 151);
                assert_eq!(children.len(), 2);
                assert_eq!(
                    children[0],
                    MirrorNode::RunGroup {
                        count: 150,
                        value: Box::new(MirrorNode::Scalar(Scalar::Int(5))),
                    }
                );
                assert_eq!(children[1], MirrorNode::Scalar(Scalar::Int(7)));
            }
            other => panic!("expected sequence, got {other:?}"),
        }
        assert!(text.contains("<array[151]>: ["));
        assert!(text.contains("  150x(number: 5),"));
        assert!(text.contains("  151 <number>: 7,"));
    }

    #[test]
    fn test_run_of_99_is_fully_expanded() {
        let mut graph = MemoryGraph::new();
        let seq = graph.sequence(None);
        for _ in 0..99 {
            let five = graph.int(5);
            graph.push_item(seq, five);
        }

        let (node, text) = walk_to_string(&graph, seq, WalkOptions::default());
        match &node {
            MirrorNode::Sequence { children, .. } => assert_eq!(children.len(), 99),
            other => panic!("expected sequence, got {other:?}"),
        }
        assert!(!text.contains("x(number"));
    }

    #[test]
    fn test_slow_budget_flags_subtree() {
        let mut graph = MemoryGraph::new();
        let root = graph.mapping(None);
        let leaf = graph.int(1);
        graph.insert(root, Key::Str("x".into()), leaf);

        let options = WalkOptions {
            slow_budget_secs: 0.0,
            ..Default::default()
        };
        let (node, _) = walk_to_string(&graph, root, options);
        assert!(node.metadata().unwrap().slow_subtree);

        let (fast, _) = walk_to_string(&graph, root, WalkOptions::default());
        assert!(!fast.metadata().unwrap().slow_subtree);
    }

    #[test]
    fn test_opaque_never_recursed() {
        let mut graph = MemoryGraph::new();
        let root = graph.mapping(None);
        let f = graph.opaque("function: 0x55ab");
        graph.insert(root, Key::Str("callback".into()), f);

        let (node, text) = walk_to_string(&graph, root, WalkOptions::default());
        assert_eq!(
            *entry(&node, "callback"),
            MirrorNode::Opaque {
                display: "function: 0x55ab".into()
            }
        );
        assert!(text.contains("callback <opaque>: function: 0x55ab,"));
    }

    #[test]
    fn test_heartbeat_reports_root_and_level_one() {
        let mut graph = MemoryGraph::new();
        let root = graph.mapping(None);
        let first = graph.mapping(Some("First"));
        let second = graph.mapping(Some("Second"));
        graph.insert(root, Key::Str("first".into()), first);
        graph.insert(root, Key::Str("second".into()), second);

        let buf = SharedBuf::default();
        let log = HeartbeatLog::new(
            Box::new(buf.clone()),
            HeartbeatThresholds {
                level2: Duration::ZERO,
                level3: Duration::ZERO,
                beat_interval: Duration::from_secs(30),
            },
        );
        let mut walker =
            GraphWalker::new(&graph, Vec::new(), WalkOptions::default()).with_heartbeat(log);
        walker.walk(root).unwrap();

        let lines = buf.contents();
        assert!(lines.contains("1/2 ("));
        assert!(lines.contains("2/2 ("));
        assert!(lines.contains("first"));
        assert!(lines.contains("walk complete in"));
    }

    #[test]
    fn test_transcript_streams_incrementally() {
        // The open line of a container must be written before its children
        // are processed, so a crash mid-walk leaves a readable prefix.
        let mut graph = MemoryGraph::new();
        let root = graph.mapping(Some("Outer"));
        let inner = graph.mapping(Some("Inner"));
        graph.insert(root, Key::Str("inner".into()), inner);

        let (_, text) = walk_to_string(&graph, root, WalkOptions::default());
        let outer_open = text.find("<Outer>: {").unwrap();
        let inner_open = text.find("inner <Inner>: {").unwrap();
        let outer_close = text.rfind('}').unwrap();
        assert!(outer_open < inner_open);
        assert!(inner_open < outer_close);
    }
}
