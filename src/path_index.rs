use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use log::{info, trace};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::bitvec::Bitmap;
use crate::graph::{DeBruijnGraph, NodeIndex};
use crate::io::{check_magic, write_magic};
use crate::serde_ext::PackedInts;

pub const PATH_INDEX_EXTENSION: &str = ".paths";

const MAGIC: &[u8; 4] = b"pth1";

// superbubble search gives up past this many unitigs
const MAX_SUPERBUBBLE_SIZE: usize = 1000;

// Unitig membership plus a simple-superbubble index over the unitig graph.
//
// Unitig ids are 1-based; 0 means "none". Every node maps to a coordinate in
// the global concatenation of unitig spellings; a boundary bitmap converts
// between coordinates and unitig ids.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathIndex {
    num_unitigs: usize,

    // set bit at the first coordinate of each unitig
    path_boundaries: Bitmap,
    // node (0-based) -> global coordinate
    node_coords: PackedInts,

    unitig_fronts: Vec<NodeIndex>,
    unitig_backs: Vec<NodeIndex>,

    // per unitig (0-based): is it the source of a simple superbubble
    superbubble_starts: Bitmap,
    // per unitig: [source id, distance from source] (id 0 = none)
    superbubble_sources: PackedInts,
    // per source: [terminus id, distance to terminus]
    superbubble_termini: PackedInts,
    can_reach_terminus: Bitmap,
}

// outgoing unitig ids of `unitig`, via its back node
fn outgoing_unitigs(
    graph: &dyn DeBruijnGraph,
    front_to_unitig: &HashMap<NodeIndex, usize>,
    back: NodeIndex,
) -> Vec<usize> {
    let mut out = Vec::new();
    graph.call_outgoing(back, &mut |next, _| {
        if let Some(&uid) = front_to_unitig.get(&next) {
            out.push(uid);
        }
    });
    out
}

fn incoming_unitigs(
    graph: &dyn DeBruijnGraph,
    back_to_unitig: &HashMap<NodeIndex, usize>,
    front: NodeIndex,
) -> Vec<usize> {
    let mut out = Vec::new();
    graph.call_incoming(front, &mut |pred, _| {
        if let Some(&uid) = back_to_unitig.get(&pred) {
            out.push(uid);
        }
    });
    out
}

struct SuperbubbleHit {
    terminus: usize,
    terminus_dist: u64,
    // every unitig reached, terminus included, with its distance from the
    // source start
    members: Vec<(usize, u64)>,
}

// A simple superbubble from `source`: every internal path has the same
// length, the only way out of an internal unitig leads toward the terminus,
// and there are no cycles. Anything else returns None.
fn find_superbubble(
    graph: &dyn DeBruijnGraph,
    front_to_unitig: &HashMap<NodeIndex, usize>,
    back_to_unitig: &HashMap<NodeIndex, usize>,
    unitig_lens: &[u64],
    unitig_fronts: &[NodeIndex],
    unitig_backs: &[NodeIndex],
    source: usize,
) -> Option<SuperbubbleHit> {
    let mut visited: HashSet<usize> = HashSet::new();
    let mut seen: HashMap<usize, u64> = HashMap::new();
    let mut stack: Vec<(usize, u64)> = vec![(source, 0)];

    while let Some((u, dist)) = stack.pop() {
        if visited.len() > MAX_SUPERBUBBLE_SIZE {
            return None;
        }
        visited.insert(u);

        let children = outgoing_unitigs(graph, front_to_unitig, unitig_backs[u]);
        if children.is_empty() {
            // dead end inside the bubble
            return None;
        }

        let child_dist = dist + unitig_lens[u];
        for &child in &children {
            if child == source {
                return None;
            }
            match seen.get(&child) {
                Some(&d) if d != child_dist => return None, // unequal path lengths
                Some(_) => {}
                None => {
                    seen.insert(child, child_dist);
                }
            }
            let parents = incoming_unitigs(graph, back_to_unitig, unitig_fronts[child]);
            if parents.iter().all(|p| visited.contains(p)) {
                stack.push((child, child_dist));
            }
        }

        if stack.len() == 1 && visited.len() == seen.len() {
            let (terminus, terminus_dist) = stack[0];
            // a terminus edge back to the source would close a cycle
            if outgoing_unitigs(graph, front_to_unitig, unitig_backs[terminus])
                .contains(&source)
            {
                return None;
            }
            return Some(SuperbubbleHit {
                terminus,
                terminus_dist,
                members: seen.into_iter().collect(),
            });
        }
    }

    None
}

impl PathIndex {
    pub fn new<G: DeBruijnGraph + Sync>(graph: &G) -> Self {
        let mut boundaries: Vec<u64> = vec![0];
        let mut unitig_fronts: Vec<NodeIndex> = Vec::new();
        let mut unitig_backs: Vec<NodeIndex> = Vec::new();
        let mut node_coords = vec![0u64; graph.max_index() as usize];

        graph.call_unitigs(&mut |_, path| {
            let mut coord = *boundaries.last().unwrap();
            unitig_fronts.push(path[0]);
            unitig_backs.push(*path.last().unwrap());
            for &node in path {
                node_coords[(node - 1) as usize] = coord;
                coord += 1;
            }
            boundaries.push(coord);
        });

        let num_unitigs = boundaries.len() - 1;
        info!("Indexed {} unitigs", num_unitigs);

        let total = *boundaries.last().unwrap() as usize;
        let starts: Vec<usize> = boundaries[..num_unitigs]
            .iter()
            .map(|&c| c as usize)
            .collect();
        let path_boundaries = Bitmap::adaptive_from_ones(total, &starts);

        let unitig_lens: Vec<u64> = boundaries.windows(2).map(|w| w[1] - w[0]).collect();
        let front_to_unitig: HashMap<NodeIndex, usize> = unitig_fronts
            .iter()
            .enumerate()
            .map(|(i, &n)| (n, i))
            .collect();
        let back_to_unitig: HashMap<NodeIndex, usize> = unitig_backs
            .iter()
            .enumerate()
            .map(|(i, &n)| (n, i))
            .collect();

        // probe every unitig as a potential superbubble source
        trace!("Indexing superbubbles");
        let hits: Vec<(usize, SuperbubbleHit)> = (0..num_unitigs)
            .into_par_iter()
            .filter_map(|i| {
                find_superbubble(
                    graph,
                    &front_to_unitig,
                    &back_to_unitig,
                    &unitig_lens,
                    &unitig_fronts,
                    &unitig_backs,
                    i,
                )
                .map(|hit| (i, hit))
            })
            .collect();

        let mut is_start = vec![false; num_unitigs];
        let mut sources = vec![0u64; num_unitigs * 2];
        let mut termini = vec![0u64; num_unitigs * 2];
        let mut can_reach = vec![false; num_unitigs];

        for (source, hit) in &hits {
            is_start[*source] = true;
            can_reach[*source] = true;
            termini[source * 2] = (hit.terminus + 1) as u64;
            termini[source * 2 + 1] = hit.terminus_dist;
            for &(u, d) in &hit.members {
                can_reach[u] = true;
                // keep the nearest enclosing source
                if sources[u * 2] == 0 || sources[u * 2 + 1] > d {
                    sources[u * 2] = (*source + 1) as u64;
                    sources[u * 2 + 1] = d;
                }
            }
        }

        info!(
            "Indexed {} simple superbubbles",
            is_start.iter().filter(|&&b| b).count()
        );

        PathIndex {
            num_unitigs,
            path_boundaries,
            node_coords: PackedInts::pack_from(node_coords),
            unitig_fronts,
            unitig_backs,
            superbubble_starts: Bitmap::from_bools(is_start),
            superbubble_sources: PackedInts::pack_from(sources),
            superbubble_termini: PackedInts::pack_from(termini),
            can_reach_terminus: Bitmap::from_bools(can_reach),
        }
    }

    pub fn num_unitigs(&self) -> usize {
        self.num_unitigs
    }

    // 1-based unitig id owning a global coordinate
    pub fn coord_to_path_id(&self, coord: u64) -> usize {
        self.path_boundaries.rank1(coord as usize)
    }

    // global coordinate of a unitig's first base
    pub fn path_id_to_coord(&self, path_id: usize) -> u64 {
        self.path_boundaries.select1(path_id) as u64
    }

    pub fn path_length(&self, path_id: usize) -> u64 {
        let start = self.path_id_to_coord(path_id);
        if path_id == self.num_unitigs {
            self.path_boundaries.size() as u64 - start
        } else {
            self.path_id_to_coord(path_id + 1) - start
        }
    }

    // unitig id and offset within it
    pub fn node_to_path(&self, node: NodeIndex) -> (usize, u64) {
        let coord = self.node_coords.get((node - 1) as usize);
        let id = self.coord_to_path_id(coord);
        (id, coord - self.path_id_to_coord(id))
    }

    pub fn unitig_front(&self, path_id: usize) -> NodeIndex {
        self.unitig_fronts[path_id - 1]
    }

    pub fn unitig_back(&self, path_id: usize) -> NodeIndex {
        self.unitig_backs[path_id - 1]
    }

    pub fn is_superbubble_source(&self, path_id: usize) -> bool {
        self.superbubble_starts.get(path_id - 1)
    }

    // (terminus id, distance), or (0, 0) when not a source
    pub fn get_superbubble_terminus(&self, path_id: usize) -> (usize, u64) {
        if !self.is_superbubble_source(path_id) {
            return (0, 0);
        }
        let i = path_id - 1;
        (
            self.superbubble_termini.get(i * 2) as usize,
            self.superbubble_termini.get(i * 2 + 1),
        )
    }

    // (enclosing source id, distance from it), or (0, 0)
    pub fn get_superbubble_and_dist(&self, path_id: usize) -> (usize, u64) {
        let i = path_id - 1;
        (
            self.superbubble_sources.get(i * 2) as usize,
            self.superbubble_sources.get(i * 2 + 1),
        )
    }

    pub fn can_reach_superbubble_terminus(&self, path_id: usize) -> bool {
        self.can_reach_terminus.get(path_id - 1)
    }

    // Shortest distance from the start of unitig `a` to the start of unitig
    // `b` through the superbubble chain; None when unreachable within
    // `max_dist`.
    pub fn get_dist(&self, a: usize, b: usize, max_dist: u64) -> Option<u64> {
        if a == b {
            return Some(0);
        }

        let (sb1, d1) = self.get_superbubble_and_dist(a);
        let (mut sb2, d2) = self.get_superbubble_and_dist(b);
        let is_source1 = self.is_superbubble_source(a);

        // b sits in the superbubble sourced at a
        if is_source1 && sb2 == a {
            return Some(d2);
        }

        // both inside the same superbubble: only source-to-terminus paths
        // have a well-defined length
        if sb1 != 0 && sb1 == sb2 {
            let (t, _) = self.get_superbubble_terminus(sb1);
            if t == b && self.can_reach_superbubble_terminus(a) {
                return Some(d2 - d1);
            }
            return None;
        }

        if !self.can_reach_superbubble_terminus(a) {
            return None;
        }

        let start = if is_source1 {
            a
        } else if sb1 != 0 {
            sb1
        } else {
            return None;
        };
        let (t, tdist) = self.get_superbubble_terminus(start);
        if t == 0 {
            return None;
        }
        let mut d = tdist - if is_source1 { 0 } else { d1 };

        // walk the chain of nested superbubbles toward b
        while sb2 != 0 && sb2 != t && d < max_dist {
            let (next_sb, next_d) = self.get_superbubble_and_dist(sb2);
            if next_sb != 0 {
                d += next_d;
            }
            sb2 = next_sb;
        }

        if sb2 == t && d.saturating_add(d2) <= max_dist {
            Some(d + d2)
        } else {
            None
        }
    }

    pub fn call_dists(&self, a: usize, b: usize, max_dist: u64, cb: &mut dyn FnMut(u64)) {
        if let Some(d) = self.get_dist(a, b, max_dist) {
            cb(d);
        }
    }

    pub fn serialize_to_file(&self, graph_basename: &str) -> bincode::Result<()> {
        let path = format!("{}{}", graph_basename, PATH_INDEX_EXTENSION);
        let mut out = BufWriter::new(File::create(path).map_err(bincode::Error::from)?);
        write_magic(&mut out, MAGIC).map_err(bincode::Error::from)?;
        bincode::serialize_into(&mut out, self)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Option<Self> {
        let mut input = BufReader::new(File::open(path).ok()?);
        if !check_magic(&mut input, MAGIC) {
            return None;
        }
        bincode::deserialize_from(&mut input).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::HashGraph;
    use crate::test_utils::{assert_iter_eq, temp_file_name};

    const K: usize = 5;

    // Two paths from a shared prefix to a shared suffix through equal-length
    // variants, plus an unrelated contig.
    fn bubble_graph() -> HashGraph {
        let prefix = b"ACGGCTAGTC".to_vec();
        let branch_x = b"TTAACCGGTA".to_vec();
        let branch_y = b"GGTTCAATCC".to_vec();
        let suffix = b"CATGCAGTCA".to_vec();

        let mut hap_x = prefix.clone();
        hap_x.extend(&branch_x);
        hap_x.extend(&suffix);
        let mut hap_y = prefix;
        hap_y.extend(&branch_y);
        hap_y.extend(&suffix);

        let unrelated = b"GAGAGTTTGTGACTTTACAC".to_vec();
        HashGraph::from_sequences(K, &[hap_x, hap_y, unrelated])
    }

    fn path_of(index: &PathIndex, graph: &HashGraph, seq: &[u8]) -> usize {
        let node = graph.map_to_nodes(seq)[0];
        assert_ne!(node, 0);
        index.node_to_path(node).0
    }

    #[test]
    fn unitig_membership() {
        let g = bubble_graph();
        let index = PathIndex::new(&g);

        // coordinates are dense and every node belongs to one unitig
        for node in 1..=g.max_index() {
            let (id, off) = index.node_to_path(node);
            assert!(id >= 1 && id <= index.num_unitigs());
            assert!(off < index.path_length(id));
        }

        // consecutive nodes of one unitig have consecutive coordinates
        let mut checked = 0;
        g.call_unitigs(&mut |_, path| {
            for w in path.windows(2) {
                let (ida, offa) = index.node_to_path(w[0]);
                let (idb, offb) = index.node_to_path(w[1]);
                assert_eq!(ida, idb);
                assert_eq!(offa + 1, offb);
                checked += 1;
            }
        });
        assert!(checked > 0);
    }

    #[test]
    fn superbubble_distances() {
        let g = bubble_graph();
        let index = PathIndex::new(&g);

        // identify the four unitigs of the bubble by probing k-mers
        let src = path_of(&index, &g, b"ACGGC"); // inside the shared prefix
        let term = path_of(&index, &g, b"AGTCA"); // near the shared suffix end
        let bra = path_of(&index, &g, b"AACCG"); // inside branch x
        let brb = path_of(&index, &g, b"TTCAA"); // inside branch y
        let other = path_of(&index, &g, b"GAGAG");

        assert!(index.is_superbubble_source(src));
        assert!(!index.is_superbubble_source(bra));

        let (t, tdist) = index.get_superbubble_terminus(src);
        assert_eq!(t, term);
        assert_eq!(tdist, index.path_length(src) + index.path_length(bra));
        // both branches have the same length by construction
        assert_eq!(index.path_length(bra), index.path_length(brb));

        // source to terminus goes through the bubble
        assert_eq!(index.get_dist(src, term, 1000), Some(tdist));
        // branches cannot reach each other
        assert_eq!(index.get_dist(bra, brb, 1000), None);
        // unrelated contig is unreachable
        assert_eq!(index.get_dist(src, other, 1000), None);
        // inside the bubble: source to branch
        assert_eq!(
            index.get_dist(src, bra, 1000),
            Some(index.path_length(src))
        );
        assert_eq!(index.get_dist(src, src, 1000), Some(0));
    }

    #[test]
    fn serialize_roundtrip() {
        let g = bubble_graph();
        let index = PathIndex::new(&g);

        let base = temp_file_name("paths");
        let base = base.to_str().unwrap().to_owned();
        index.serialize_to_file(&base).unwrap();

        let path = format!("{}{}", base, PATH_INDEX_EXTENSION);
        let loaded = PathIndex::load_from_file(&path).unwrap();
        assert_eq!(loaded.num_unitigs(), index.num_unitigs());
        assert_iter_eq(
            (1..=g.max_index()).map(|n| loaded.node_to_path(n)),
            (1..=g.max_index()).map(|n| index.node_to_path(n)),
        );
        std::fs::remove_file(path).unwrap();
    }
}
