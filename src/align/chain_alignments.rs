use log::trace;

use super::alignment::Alignment;
use super::annotation_buffer::AnnotationBuffer;
use super::config::AlignerConfig;
use super::label_change::LabelChangeScorer;
use super::{Score, NINF};
use crate::graph::{DeBruijnGraph, NodeIndex};

// window of candidate predecessors per anchor
const BANDWIDTH: usize = 65;

// A chainable position inside one local alignment: the end of a stretch of
// consecutive matches long enough to identify the spot, anchored to a real
// node of the path.
#[derive(Debug, Clone)]
struct Anchor {
    // query coordinates of the match run, in full-query space
    begin: usize,
    end: usize,
    // interned label set of the source alignment
    col: usize,
    // index of the source alignment
    index: usize,
    // node spelling the run's last character
    node: NodeIndex,
    // length of the match run
    mem_length: usize,
}

#[derive(Debug, Clone, Copy)]
enum LinkKind {
    // stay inside the same alignment
    Within,
    // enter the next alignment seamlessly through the graph
    Contiguous { label_change: Score, carried_col: usize },
    // graph-discontinuous jump, paid with a node insertion
    Jump {
        gap: usize,
        label_change: Score,
        carried_col: usize,
    },
}

#[derive(Debug, Clone, Copy)]
struct DpCell {
    score: Score,
    pred: Option<(usize, LinkKind)>,
    // running state where the last connection was a jump
    score_jump: Score,
    pred_jump: Option<(usize, LinkKind)>,
}

// Walks the graph from `from` spelling the missing k-mer prefix characters
// of a node being grafted; returns the walked nodes.
fn graft_walk(
    graph: &dyn DeBruijnGraph,
    from: NodeIndex,
    target_kmer: &[u8],
    offset: usize,
) -> Option<Vec<NodeIndex>> {
    let k = graph.k();
    let mut nodes = Vec::with_capacity(k - 1 - offset);
    let mut cur = from;
    for t in offset..k - 1 {
        let want = target_kmer[t];
        let mut next = None;
        graph.call_outgoing(cur, &mut |node, c| {
            if c == want && next.is_none() {
                next = Some(node);
            }
        });
        cur = next?;
        nodes.push(cur);
    }
    Some(nodes)
}

// first node and effective offset of an alignment after trimming `trim`
// query characters off a match-run prefix
fn trimmed_entry(aln: &Alignment, trim: usize, node_overlap: usize) -> Option<(NodeIndex, usize)> {
    let drop = (trim + aln.get_offset()).saturating_sub(node_overlap);
    if drop >= aln.get_nodes().len() {
        return None;
    }
    let offset = (aln.get_offset() + trim).min(node_overlap);
    Some((aln.get_nodes()[drop], offset))
}

fn extract_anchors(
    alignments: &[Alignment],
    buffer: &mut AnnotationBuffer,
    config: &AlignerConfig,
    node_overlap: usize,
) -> Vec<Anchor> {
    let mut anchors = Vec::new();

    for (index, aln) in alignments.iter().enumerate() {
        let col = buffer.cache_column_set(aln.label_columns.clone());
        let qb = aln.query_begin();

        let mut qpos = 0usize; // within the query view
        let mut ref_pos = 0usize;
        for &(op, len) in aln.get_cigar().ops() {
            use super::cigar::Op;
            match op {
                Op::Clipped => {}
                Op::Match => {
                    let run_end_ref = ref_pos + len;
                    if len >= config.min_seed_length {
                        // node spelling the run's last reference character
                        let node_pos =
                            (run_end_ref + aln.get_offset()).checked_sub(node_overlap + 1);
                        if let Some(node_pos) = node_pos {
                            if node_pos < aln.get_nodes().len() {
                                anchors.push(Anchor {
                                    begin: qb + qpos,
                                    end: qb + qpos + len,
                                    col,
                                    index,
                                    node: aln.get_nodes()[node_pos],
                                    mem_length: len,
                                });
                            }
                        }
                    }
                    qpos += len;
                    ref_pos += len;
                }
                Op::Mismatch => {
                    qpos += len;
                    ref_pos += len;
                }
                Op::Insertion => qpos += len,
                Op::Deletion => ref_pos += len,
                Op::NodeInsertion => {}
            }
        }
    }

    anchors.sort_by_key(|a| (a.end, a.col, a.begin));
    anchors
}

// Splice already-computed local alignments into longer chains, optionally
// switching labels at a graph-derived cost and, when `allow_jump` is set,
// bridging graph-discontinuous pieces with a single node insertion.
//
// Alignments that already cover the whole query pass through unchanged.
// Only chains spanning at least two distinct source alignments are emitted.
pub fn chain_alignments<'a>(
    graph: &dyn DeBruijnGraph,
    config: &AlignerConfig,
    buffer: &mut AnnotationBuffer,
    scorer: &LabelChangeScorer,
    alignments: Vec<Alignment<'a>>,
    callback: &mut dyn FnMut(Alignment<'a>),
    terminate: &dyn Fn() -> bool,
) {
    let node_overlap = graph.k() - 1;

    let mut chainable: Vec<Alignment<'a>> = Vec::new();
    for aln in alignments {
        if (aln.get_clipping() == 0 && aln.get_end_clipping() == 0) || aln.get_offset() > 0 {
            callback(aln);
        } else {
            chainable.push(aln);
        }
    }

    if chainable.len() < 2 {
        for aln in chainable {
            callback(aln);
        }
        return;
    }

    chainable.sort_by(|a, b| {
        (
            a.get_orientation(),
            a.query_end(),
            a.query_begin(),
            b.get_score(),
        )
            .cmp(&(
                b.get_orientation(),
                b.query_end(),
                b.query_begin(),
                a.get_score(),
            ))
    });

    trace!("Chaining {} alignments", chainable.len());

    let suffix_scores: Vec<Vec<Score>> = chainable
        .iter()
        .map(|a| a.query_suffix_scores(config))
        .collect();

    let anchors = extract_anchors(&chainable, buffer, config, node_overlap);
    if anchors.is_empty() {
        for aln in chainable {
            callback(aln);
        }
        return;
    }

    // piece score of anchor i's alignment between query positions p and q
    let piece_score = |i: &Anchor, p: usize, q: usize| -> Score {
        let aln = &chainable[i.index];
        let qb = aln.query_begin();
        suffix_scores[i.index][q - qb] - suffix_scores[i.index][p - qb]
    };

    let mut cells: Vec<DpCell> = anchors
        .iter()
        .map(|a| DpCell {
            score: chainable[a.index].get_score()
                - piece_score(a, a.end, chainable[a.index].query_end()),
            pred: None,
            score_jump: NINF,
            pred_jump: None,
        })
        .collect();

    for i in 0..anchors.len() {
        if terminate() {
            return;
        }
        let (begin_i, end_i, index_i, col_i, mem_i) = {
            let a = &anchors[i];
            (a.begin, a.end, a.index, a.col, a.mem_length)
        };
        let b_qb = chainable[index_i].query_begin();

        let window_start = i.saturating_sub(BANDWIDTH);
        for j in (window_start..i).rev() {
            let aj = &anchors[j];
            if aj.end >= end_i {
                continue;
            }

            if aj.index == index_i {
                // within the same alignment
                let cand = cells[j].score + piece_score(&anchors[i], aj.end, end_i);
                if cand > cells[i].score {
                    cells[i].score = cand;
                    cells[i].pred = Some((j, LinkKind::Within));
                }
                let cand_jump = cells[j].score_jump + piece_score(&anchors[i], aj.end, end_i);
                if cand_jump > cells[i].score_jump {
                    cells[i].score_jump = cand_jump;
                    cells[i].pred_jump = Some((j, LinkKind::Within));
                }
                continue;
            }

            // crossing into anchor i's alignment at junction aj.end
            if aj.end > begin_i {
                // the anchor's own run must survive the junction trim
                continue;
            }

            let (carried_col, label_change) =
                scorer.get_label_change_score(buffer, aj.col, col_i, config);
            if label_change == NINF {
                continue;
            }

            if aj.end >= b_qb {
                // trimmable overlap; seamless if the graph connects
                let trim = aj.end - b_qb;
                if let Some((entry_node, entry_offset)) =
                    trimmed_entry(&chainable[index_i], trim, node_overlap)
                {
                    let connected = if entry_offset == node_overlap {
                        let mut adjacent = false;
                        graph.call_outgoing(aj.node, &mut |node, _| {
                            adjacent |= node == entry_node;
                        });
                        adjacent
                    } else {
                        let kmer = graph.node_sequence(entry_node);
                        graft_walk(graph, aj.node, &kmer, entry_offset).is_some()
                    };

                    if connected {
                        let cand = cells[j].score
                            + piece_score(&anchors[i], aj.end, end_i)
                            + label_change;
                        if cand > cells[i].score {
                            cells[i].score = cand;
                            cells[i].pred = Some((
                                j,
                                LinkKind::Contiguous {
                                    label_change,
                                    carried_col,
                                },
                            ));
                        }
                    }
                }
            }

            if config.allow_jump && anchors[j].mem_length >= graph.k() {
                let gap = b_qb.saturating_sub(aj.end);
                let jump_start = aj.end.max(b_qb);
                let mut cand = cells[j].score
                    + piece_score(&anchors[i], jump_start, end_i)
                    + config.node_insertion_penalty
                    + config.gap_opening_penalty
                    + label_change;
                if gap > 0 {
                    cand += config.gap_score(gap);
                }
                if cand > cells[i].score_jump {
                    cells[i].score_jump = cand;
                    cells[i].pred_jump = Some((
                        j,
                        LinkKind::Jump {
                            gap,
                            label_change,
                            carried_col,
                        },
                    ));
                }
            }
        }

        // commit the jump when it beats the plain chain
        if mem_i >= graph.k() && cells[i].score_jump > cells[i].score {
            cells[i].score = cells[i].score_jump;
            cells[i].pred = cells[i].pred_jump;
        }
    }

    // backtrack in decreasing score
    let mut order: Vec<usize> = (0..anchors.len()).collect();
    order.sort_by_key(|&i| {
        (
            -(cells[i].score as i64),
            anchors[i].begin,
            anchors[i].end,
        )
    });

    let mut used = vec![false; chainable.len()];
    for &start in &order {
        if terminate() {
            return;
        }
        if used[anchors[start].index] {
            continue;
        }

        // collect the anchor path back to the chain start
        let mut steps = Vec::new();
        let mut cur = start;
        loop {
            steps.push(cur);
            match cells[cur].pred {
                Some((j, _)) => cur = j,
                None => break,
            }
        }
        steps.reverse();

        let distinct: std::collections::HashSet<usize> =
            steps.iter().map(|&s| anchors[s].index).collect();
        if distinct.len() < 2 {
            continue;
        }
        if steps.iter().any(|&s| used[anchors[s].index]) {
            continue;
        }
        for &s in &steps {
            used[anchors[s].index] = true;
        }

        // splice the pieces along the chain
        let mut acc = chainable[anchors[steps[0]].index].clone();
        let mut ok = true;
        for w in steps.windows(2) {
            let (j, i) = (w[0], w[1]);
            let kind = match cells[i].pred {
                Some((p, kind)) if p == j => kind,
                _ => LinkKind::Within,
            };
            if matches!(kind, LinkKind::Within) {
                continue;
            }

            let junction = anchors[j].end;
            let b_index = anchors[i].index;
            let mut piece = chainable[b_index].clone();

            // cut the accumulated alignment at the junction
            let cut = acc.query_end().saturating_sub(junction);
            acc.trim_query_suffix(cut, config);
            if acc.empty() {
                ok = false;
                break;
            }

            match kind {
                LinkKind::Within => unreachable!(),
                LinkKind::Contiguous {
                    label_change,
                    carried_col: _,
                } => {
                    piece.trim_query_prefix(
                        junction - piece.query_begin(),
                        node_overlap,
                        config,
                    );
                    if piece.empty() {
                        ok = false;
                        break;
                    }
                    if piece.get_offset() < node_overlap {
                        let entry = piece.get_nodes()[0];
                        let kmer = graph.node_sequence(entry);
                        match graft_walk(
                            graph,
                            *acc.get_nodes().last().unwrap(),
                            &kmer,
                            piece.get_offset(),
                        ) {
                            Some(walked) => piece.extend_offset(walked),
                            None => {
                                ok = false;
                                break;
                            }
                        }
                    }
                    piece.trim_clipping();
                    acc.trim_end_clipping();
                    acc.splice(piece, label_change, config);
                }
                LinkKind::Jump {
                    gap,
                    label_change,
                    carried_col: _,
                } => {
                    let trim = junction.saturating_sub(piece.query_begin());
                    piece.trim_query_prefix(trim, node_overlap, config);
                    if piece.empty() {
                        ok = false;
                        break;
                    }
                    piece.insert_gap_prefix(gap as isize, node_overlap, config);
                    acc.trim_end_clipping();
                    acc.splice(piece, label_change, config);
                }
            }
        }

        if ok && !acc.empty() && acc.is_valid(graph, config) {
            callback(acc);
        }
    }

    // leftovers are reported unchained
    for (i, aln) in chainable.into_iter().enumerate() {
        if !used[i] {
            callback(aln);
        }
    }
}
