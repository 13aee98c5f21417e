use log::trace;

use super::alignment::{Alignment, Seed};
use super::config::AlignerConfig;
use super::Score;
use crate::annot::Column;

// A chain: alignments in increasing query order, each with its
// reference-coordinate distance from the previous element (0 for the first).
pub type Chain<'a> = Vec<(Alignment<'a>, i64)>;

const NID: u32 = u32::MAX;

// window of candidate predecessors examined per anchor
const BANDWIDTH: usize = 65;

// One sparse-DP state: a seed exploded per (label, coordinate).
#[derive(Debug, Clone, Copy)]
pub struct TableElem {
    pub label: Column,
    pub coordinate: i64,
    pub seed_clipping: i32,
    pub seed_end: i32,
    pub chain_score: Score,
    pub seed_index: u32,
}

// Sparse chaining DP over per-(label, coordinate) seed states. Returns the
// scored table, the backtrace, and the seed/node counts that went in.
//
// The scoring function is derived from minimap2: a gap of g between the
// query and reference advances costs ceil(sl * g + 0.5 * log2(g + 1)) with
// sl = min_seed_length / 100.
pub fn chain_seeds<'a>(
    config: &AlignerConfig,
    query: &[u8],
    seeds: &[Seed<'a>],
) -> (Vec<TableElem>, Vec<u32>, usize, usize) {
    let mut num_nodes = 0usize;
    let query_size = query.len() as i64;

    let mut dp_table: Vec<TableElem> = Vec::with_capacity(seeds.len());
    for (i, seed) in seeds.iter().enumerate().rev() {
        num_nodes += seed.size();
        for (j, &label) in seed.label_columns.iter().enumerate() {
            let coords = &seed.label_coordinates[j];
            let take = coords.len().min(config.max_num_seeds_per_locus);
            for &coord in coords.iter().rev().take(take) {
                dp_table.push(TableElem {
                    label,
                    coordinate: coord,
                    seed_clipping: seed.get_clipping() as i32,
                    seed_end: (seed.get_clipping() + seed.get_query_view().len()) as i32,
                    chain_score: seed.get_query_view().len() as Score,
                    seed_index: i as u32,
                });
            }
        }
    }

    let num_seeds = dp_table.len();
    let mut backtrace = vec![NID; dp_table.len()];
    if dp_table.is_empty() {
        return (dp_table, backtrace, num_seeds, num_nodes);
    }

    trace!("Sorting {} anchors", dp_table.len());
    // per label, descending reference coordinate: the chain direction
    dp_table.sort_by(|a, b| {
        (a.label, -a.coordinate, a.seed_clipping, a.seed_end).cmp(&(
            b.label,
            -b.coordinate,
            b.seed_clipping,
            b.seed_end,
        ))
    });
    trace!("Chaining anchors");

    let sl = config.min_seed_length as f32 * 0.01;

    let mut label_start = 0;
    while label_start < dp_table.len() {
        let label = dp_table[label_start].label;
        let mut label_end = label_start;
        while label_end < dp_table.len() && dp_table[label_end].label == label {
            label_end += 1;
        }

        for i in label_start..label_end {
            let prev = dp_table[i];
            if prev.seed_clipping == 0 {
                // nothing of the query precedes this state
                continue;
            }

            let it_end = (i + 1 + BANDWIDTH).min(label_end + 1) - 1;
            let coord_cutoff = prev.coordinate - query_size;

            for j in (i + 1)..it_end {
                let elem = dp_table[j];
                debug_assert_eq!(elem.label, prev.label);
                if coord_cutoff > elem.coordinate {
                    break;
                }

                let dist = prev.seed_clipping - elem.seed_clipping;
                let coord_dist = prev.coordinate - elem.coordinate;
                if dist > 0 && (dist as i64).max(coord_dist) < query_size {
                    let match_len =
                        (dist as i64).min(coord_dist).min((elem.seed_end - elem.seed_clipping) as i64)
                            as Score;
                    let mut cur_score = prev.chain_score + match_len;
                    if coord_dist != dist as i64 {
                        let gap = (coord_dist - dist as i64).unsigned_abs() as f32;
                        let penalty = (sl * gap + 0.5 * (gap + 1.0).log2()).ceil();
                        cur_score -= penalty as Score;
                    }
                    if cur_score >= dp_table[j].chain_score {
                        dp_table[j].chain_score = cur_score;
                        backtrace[j] = i as u32;
                    }
                }
            }
        }

        label_start = label_end;
    }

    (dp_table, backtrace, num_seeds, num_nodes)
}

// The richer chaining variant used when a path index is available: the
// reference distance between two anchors is measured through the graph's
// unitig and superbubble structure instead of coordinate space, and anchor
// pairs with no graph connection are discarded early.
pub fn chain_and_filter_seeds<'a>(
    config: &AlignerConfig,
    query: &[u8],
    seeds: &[Seed<'a>],
    path_index: &crate::path_index::PathIndex,
) -> (Vec<TableElem>, Vec<u32>, usize, usize) {
    let (mut dp_table, mut backtrace, num_seeds, num_nodes) = chain_seeds(config, query, seeds);
    if dp_table.is_empty() {
        return (dp_table, backtrace, num_seeds, num_nodes);
    }

    // graph distance between the first nodes of two seeds
    let graph_dist = |from: &Seed<'a>, to: &Seed<'a>, max_dist: u64| -> Option<i64> {
        let (pa, ca) = path_index.node_to_path(from.get_nodes()[0]);
        let (pb, cb) = path_index.node_to_path(to.get_nodes()[0]);
        if pa == pb {
            return Some(cb as i64 - ca as i64);
        }
        path_index
            .get_dist(pa, pb, max_dist)
            .map(|d| d as i64 + cb as i64 - ca as i64)
    };

    // redo the scoring pass with graph distances
    for cell in dp_table.iter_mut() {
        cell.chain_score = (seeds[cell.seed_index as usize].get_query_view().len()) as Score;
    }
    for bt in backtrace.iter_mut() {
        *bt = NID;
    }

    let query_size = query.len() as i64;
    let sl = config.min_seed_length as f32 * 0.01;

    let mut label_start = 0;
    while label_start < dp_table.len() {
        let label = dp_table[label_start].label;
        let mut label_end = label_start;
        while label_end < dp_table.len() && dp_table[label_end].label == label {
            label_end += 1;
        }

        for i in label_start..label_end {
            let prev = dp_table[i];
            if prev.seed_clipping == 0 {
                continue;
            }
            let it_end = (i + 1 + BANDWIDTH).min(label_end + 1) - 1;

            for j in (i + 1)..it_end {
                let elem = dp_table[j];
                let dist = prev.seed_clipping - elem.seed_clipping;
                if dist <= 0 || dist as i64 >= query_size {
                    continue;
                }

                // impossible connections are dropped here
                let coord_dist = match graph_dist(
                    &seeds[elem.seed_index as usize],
                    &seeds[prev.seed_index as usize],
                    query_size as u64,
                ) {
                    Some(d) if d > 0 && d < query_size => d,
                    _ => continue,
                };

                let match_len = (dist as i64)
                    .min(coord_dist)
                    .min((elem.seed_end - elem.seed_clipping) as i64)
                    as Score;
                let mut cur_score = prev.chain_score + match_len;
                if coord_dist != dist as i64 {
                    let gap = (coord_dist - dist as i64).unsigned_abs() as f32;
                    let penalty = (sl * gap + 0.5 * (gap + 1.0).log2()).ceil();
                    cur_score -= penalty as Score;
                }
                if cur_score >= dp_table[j].chain_score {
                    dp_table[j].chain_score = cur_score;
                    backtrace[j] = i as u32;
                }
            }
        }

        label_start = label_end;
    }

    (dp_table, backtrace, num_seeds, num_nodes)
}

// Chain forward and reverse-complement seeds, then backtrack chains in
// decreasing score. Chains with identical node paths merge their coordinate
// sets instead of being reported twice. A score group whose combined exact
// match coverage falls below `min_exact_match` stops the enumeration.
#[allow(clippy::too_many_arguments)]
pub fn call_seed_chains_both_strands<'a>(
    forward: &'a [u8],
    reverse: &'a [u8],
    config: &AlignerConfig,
    fwd_seeds: Vec<Seed<'a>>,
    bwd_seeds: Vec<Seed<'a>>,
    callback: &mut dyn FnMut(Chain<'a>, Score),
    skip_column: &dyn Fn(Column) -> bool,
    terminate: &dyn Fn() -> bool,
) -> (usize, usize) {
    let both_seeds: [Vec<Seed<'a>>; 2] = [
        fwd_seeds
            .into_iter()
            .filter(|s| !s.empty() && !s.label_columns.is_empty())
            .collect(),
        bwd_seeds
            .into_iter()
            .filter(|s| !s.empty() && !s.label_columns.is_empty())
            .collect(),
    ];

    if both_seeds[0].is_empty() && both_seeds[1].is_empty() {
        return (0, 0);
    }

    trace!("Chaining forward seeds");
    let (dp_fwd, bt_fwd, mut num_seeds, mut num_nodes) =
        chain_seeds(config, forward, &both_seeds[0]);
    trace!("Chaining reverse complement seeds");
    let (dp_bwd, bt_bwd, ns, nn) = chain_seeds(config, reverse, &both_seeds[1]);
    num_seeds += ns;
    num_nodes += nn;

    let dp_tables = [dp_fwd, dp_bwd];
    let backtraces = [bt_fwd, bt_bwd];

    // chain starts in decreasing score order
    let mut starts: Vec<(Score, usize, usize)> = Vec::new();
    for (t, dp) in dp_tables.iter().enumerate() {
        for (i, elem) in dp.iter().enumerate() {
            starts.push((elem.chain_score, t, i));
        }
    }
    if starts.is_empty() {
        trace!("No chains found");
        return (num_seeds, num_nodes);
    }
    starts.sort_by_key(|&(score, t, i)| (-(score as i64), t, i));

    let mut used = [
        vec![false; dp_tables[0].len()],
        vec![false; dp_tables[1].len()],
    ];

    let mut covered = vec![false; forward.len()];
    let mut num_covered = 0usize;
    let min_covered = (config.min_exact_match * forward.len() as f32) as usize;

    let mut group: Vec<(Vec<(Seed<'a>, i64)>, Score)> = Vec::new();
    let mut last_score = Score::MIN;
    let mut stopped = false;

    let mut flush =
        |group: &mut Vec<(Vec<(Seed<'a>, i64)>, Score)>,
         covered: &mut Vec<bool>,
         num_covered: &mut usize,
         callback: &mut dyn FnMut(Chain<'a>, Score)| {
            if group.is_empty() {
                return true;
            }

            // merge duplicate chains: same node lists, united coordinates
            let mut merged: Vec<(Vec<(Seed<'a>, i64)>, Score)> = Vec::new();
            'outer: for (chain, score) in group.drain(..) {
                for (kept, _) in merged.iter_mut() {
                    let same = kept.len() == chain.len()
                        && kept
                            .iter()
                            .zip(&chain)
                            .all(|((a, _), (b, _))| a.get_nodes() == b.get_nodes());
                    if same {
                        for ((a, _), (b, _)) in kept.iter_mut().zip(&chain) {
                            for (ca, cb) in a
                                .label_coordinates
                                .iter_mut()
                                .zip(&b.label_coordinates)
                            {
                                let mut u = ca.clone();
                                u.extend(cb.iter().copied());
                                u.sort_unstable();
                                u.dedup();
                                *ca = u;
                            }
                        }
                        continue 'outer;
                    }
                }
                merged.push((chain, score));
            }

            // the coverage gate counts this group's exact matches
            let mut group_added = 0;
            for (chain, _) in &merged {
                for (seed, _) in chain {
                    let begin = seed.get_clipping();
                    let end = begin + seed.get_query_view().len();
                    for pos in begin..end.min(covered.len()) {
                        if !covered[pos] {
                            covered[pos] = true;
                            group_added += 1;
                        }
                    }
                }
            }
            *num_covered += group_added;
            if *num_covered < min_covered {
                trace!("Chain coverage too low, stopping");
                return false;
            }

            for (chain, score) in merged {
                let chain: Chain<'a> = chain
                    .into_iter()
                    .map(|(seed, dist)| (Alignment::from_seed(&seed, config), dist))
                    .collect();
                callback(chain, score);
            }
            true
        };

    for &(chain_score, t, i) in &starts {
        if terminate() || stopped {
            break;
        }
        if used[t][i] {
            continue;
        }

        let dp_table = &dp_tables[t];
        let seeds = &both_seeds[t];
        let backtrace = &backtraces[t];

        let mut chain_seeds: Vec<(Seed<'a>, i64)> = Vec::new();
        let mut cur = i;
        while cur != NID as usize {
            let elem = &dp_table[cur];
            if skip_column(elem.label) {
                break;
            }
            used[t][cur] = true;
            let mut seed = seeds[elem.seed_index as usize].clone();
            seed.label_columns = vec![elem.label];
            seed.label_coordinates = vec![vec![elem.coordinate]];
            chain_seeds.push((seed, elem.coordinate));
            cur = backtrace[cur] as usize;
        }

        if chain_seeds.is_empty() {
            continue;
        }

        // collapse overlapping seeds whose coordinate gap equals the query
        // gap: a clean extension of the earlier seed
        for idx in (1..chain_seeds.len()).rev() {
            let (left, right) = chain_seeds.split_at_mut(idx);
            let prev_seed = &mut left[idx - 1].0;
            let cur_seed = &mut right[0].0;
            if cur_seed.empty() || prev_seed.empty() {
                continue;
            }

            let prev_end = prev_seed.get_clipping() + prev_seed.get_query_view().len();
            if prev_end > cur_seed.get_clipping() {
                let cur_end_coord =
                    cur_seed.label_coordinates[0][0] + cur_seed.get_query_view().len() as i64;
                let prev_end_coord =
                    prev_seed.label_coordinates[0][0] + prev_seed.get_query_view().len() as i64;
                let coord_dist = cur_end_coord - prev_end_coord;
                let dist =
                    (cur_seed.get_clipping() + cur_seed.get_query_view().len() - prev_end) as i64;
                if dist == coord_dist && cur_seed.get_nodes().len() >= dist as usize {
                    let tail: Vec<_> = cur_seed.get_nodes()
                        [cur_seed.get_nodes().len() - dist as usize..]
                        .to_vec();
                    prev_seed.expand(&tail);
                    *cur_seed = Seed::default();
                }
            }
        }
        chain_seeds.retain(|(s, _)| !s.empty());
        if chain_seeds.is_empty() {
            continue;
        }

        // store query-order distances between consecutive elements
        for idx in (1..chain_seeds.len()).rev() {
            chain_seeds[idx].1 -= chain_seeds[idx - 1].1;
            debug_assert!(chain_seeds[idx].1 > 0);
        }
        chain_seeds[0].1 = 0;

        if chain_score != last_score {
            if !flush(&mut group, &mut covered, &mut num_covered, callback) {
                stopped = true;
                break;
            }
            last_score = chain_score;
        }
        group.push((chain_seeds, chain_score));
    }

    if !stopped {
        flush(&mut group, &mut covered, &mut num_covered, callback);
    }

    (num_seeds, num_nodes)
}
