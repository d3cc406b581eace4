use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{self, BufWriter, Read, Write};
use std::path::Path;

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use log::{debug, warn};
use phylotree::tree::Tree;

use crate::distances::AlignmentReport;
use crate::error::{CompareError, Result};

/// Trees read from one file, each with a display name.
pub type NamedTrees = Vec<(String, Tree)>;

/// Strip bracketed comments from Newick strings.
///
/// BEAST format includes annotations like :[&rate=0.123]2.45 where 2.45 is the actual branch length.
/// This function removes the [...] comments while preserving the branch lengths.
fn strip_comments(newick: &str) -> String {
    let mut result = String::with_capacity(newick.len());
    let mut depth = 0usize;

    for ch in newick.chars() {
        match ch {
            '[' => depth += 1,
            ']' if depth > 0 => depth -= 1,
            _ if depth == 0 => result.push(ch),
            _ => {}
        }
    }

    result
}

/// Whole file as text; `.gz` files are decompressed on the fly.
fn read_text(path: &Path) -> Result<String> {
    if path.to_string_lossy().ends_with(".gz") {
        let mut text = String::new();
        GzDecoder::new(File::open(path)?).read_to_string(&mut text)?;
        Ok(text)
    } else {
        Ok(fs::read_to_string(path)?)
    }
}

fn base_name(path: &Path) -> &str {
    path.file_name()
        .and_then(|s| s.to_str())
        .map(|s| s.trim_end_matches(".gz"))
        .map(|s| s.trim_end_matches(".trees").trim_end_matches(".nwk").trim_end_matches(".newick"))
        .unwrap_or("unknown")
}

/// Read trees from `path`, detecting the format: files starting with
/// `#NEXUS` are read as BEAST/NEXUS tree blocks, anything else as Newick
/// strings terminated by `;`.
///
/// # Errors
/// - `Io` if the file cannot be read.
/// - `NoTrees` if nothing survives burn-in and parsing.
pub fn read_trees<P: AsRef<Path>>(
    path: P,
    burnin_trees: usize,
    burnin_states: usize,
    use_real_taxa: bool,
) -> Result<NamedTrees> {
    let path = path.as_ref();
    let content = read_text(path)?;
    let trees = if content.trim_start().to_ascii_uppercase().starts_with("#NEXUS") {
        parse_beast_content(&content, base_name(path), burnin_trees, burnin_states, use_real_taxa).1
    } else {
        if burnin_states > 0 {
            warn!("{}: burn-in by state needs BEAST tree names, ignored for Newick input", path.display());
        }
        parse_newick_content(&content, base_name(path), burnin_trees)
    };
    if trees.is_empty() {
        return Err(CompareError::NoTrees(path.display().to_string()));
    }
    debug!("read {} trees from {}", trees.len(), path.display());
    Ok(trees)
}

/// Read a BEAST `.trees` (NEXUS) file, returning the TRANSLATE map and the
/// trees left after burn-in.
pub fn read_beast_trees<P: AsRef<Path>>(
    path: P,
    burnin_trees: usize,
    burnin_states: usize,
    use_real_taxa: bool,
) -> Result<(HashMap<String, String>, NamedTrees)> {
    let path = path.as_ref();
    let content = read_text(path)?;
    Ok(parse_beast_content(&content, base_name(path), burnin_trees, burnin_states, use_real_taxa))
}

fn parse_beast_content(
    content: &str,
    base_name: &str,
    burnin_trees: usize,
    burnin_states: usize,
    use_real_taxa: bool,
) -> (HashMap<String, String>, NamedTrees) {
    let taxons = parse_taxon_block(content);

    let trees = collect_tree_blocks(content)
        .into_iter()
        .enumerate()

        //generate tree name & extract state number
        .map(|(idx, tree)| {
            let state = extract_state(tree.header);
            (idx, tree, state, format!("{base_name}_tree_STATE{state}"))
        })

        // Filter out burn-in trees based on count and/or state number if 0 we don't filter
        .filter(|(idx, _tree, state, _name)| {
            (burnin_trees == 0 && burnin_states == 0)
                || (burnin_trees > 0 && *idx >= burnin_trees)
                || (burnin_states > 0 && *state > burnin_states)
        })

        .filter_map(|(idx, tree, _state, name)| {
            let newick = strip_comments(&tree.body);
            let mut phylo_tree = match Tree::from_newick(&newick) {
                Ok(t) => t,
                Err(e) => {
                    warn!("skipping tree {name} at index {idx}: {e}");
                    return None;
                }
            };

            if use_real_taxa {
                rename_leaf_nodes(&mut phylo_tree, &taxons);
            }

            Some((name, phylo_tree))
        })
        .collect::<Vec<_>>();

    (taxons, trees)
}

/// Newick strings separated by `;`, numbered from 1 in file order.
fn parse_newick_content(content: &str, base_name: &str, burnin_trees: usize) -> NamedTrees {
    strip_comments(content)
        .split_inclusive(';')
        .map(|chunk| chunk.split_whitespace().collect::<String>())
        .filter(|newick| newick.ends_with(';') && newick.len() > 1)
        .enumerate()
        .skip(burnin_trees)
        .filter_map(|(idx, newick)| {
            let name = format!("{base_name}_tree{}", idx + 1);
            match Tree::from_newick(&newick) {
                Ok(t) => Some((name, t)),
                Err(e) => {
                    warn!("skipping tree {name}: {e}");
                    None
                }
            }
        })
        .collect()
}

fn extract_state(header: &str) -> usize {
    if let Some(start) = header.to_ascii_uppercase().find("STATE_") {
        let num_start = start + 6; // length of "STATE_"
        let rest = &header[num_start..];
        let state = rest.chars()
            .take_while(|c| c.is_ascii_digit())
            .collect::<String>();
        if let Ok(num) = state.parse::<usize>() {
            return num;
        }
    }
    0
}

struct TreeBlock<'a> {
    header: &'a str,
    body: String,
}

fn collect_tree_blocks(content: &str) -> Vec<TreeBlock<'_>> {
    content
        .lines()
        .skip_while(|line| !line.trim_start().to_ascii_uppercase().starts_with("TREE "))
        .take_while(|line| !line.trim().to_ascii_uppercase().starts_with("END;"))
        .filter_map(|line| {
            let mut parts = line.splitn(2, " = ");
            let header = parts.next()?.trim();
            let body = parts.next()?.trim().to_string();
            Some(TreeBlock { header, body })
        })
        .collect()
}

fn parse_taxon_block(content: &str) -> HashMap<String, String> {
    content
        .lines()
        .skip_while(|line| !line.trim().to_ascii_uppercase().starts_with("TRANSLATE"))
        .skip(1)
        .take_while(|line| !line.trim().to_ascii_uppercase().starts_with(';'))
        // STRUCTURE:
        // 1 '1959.M.CD.59.ZR59',
        // 2 '1960.DRC60A',
        .filter_map(|line| {
            let line = line.trim().trim_end_matches(';').trim_end_matches(',');
            let mut parts = line.split_whitespace();
            let id = parts.next()?.to_string();
            let label = parts.next()?.trim_matches('\'').to_string();
            Some((id, label))
        })
        .collect::<HashMap<_, _>>()
}

/// Replace numeric leaf ids by their TRANSLATE labels. Leaves without an
/// entry keep their name.
pub fn rename_leaf_nodes(phylo_tree: &mut Tree, translate: &HashMap<String, String>) {
    for leaf_id in phylo_tree.get_leaves() {
        if let Ok(node) = phylo_tree.get_mut(&leaf_id) {
            if let Some(label) = node.name.as_ref().and_then(|n| translate.get(n)) {
                node.name = Some(label.clone());
            }
        }
    }
}

/// Output sink: a file (gzip-compressed when `path` ends with `.gz`) or
/// stdout when `path` is `-`.
fn open_output(path: &Path) -> io::Result<Box<dyn Write>> {
    if path.as_os_str() == "-" {
        return Ok(Box::new(BufWriter::new(io::stdout().lock())));
    }
    let f = File::create(path)?;
    if path.to_string_lossy().ends_with(".gz") {
        Ok(Box::new(BufWriter::new(GzEncoder::new(f, Compression::default()))))
    } else {
        Ok(Box::new(BufWriter::new(f)))
    }
}

/// Write a labeled square matrix as TSV to a file or stdout.
/// If `path` ends with `.gz`, the output is gzip-compressed.
/// If `path` equals `-`, the matrix is written to stdout (uncompressed).
pub fn write_matrix_tsv<P: AsRef<Path>, T: std::fmt::Display>(
    path: P,
    names: &[String],
    mat: &[Vec<T>],
) -> io::Result<()> {
    let mut out = open_output(path.as_ref())?;

    // Header row
    write!(&mut out, "\t")?;
    for (k, name) in names.iter().enumerate() {
        if k > 0 { write!(&mut out, "\t")?; }
        write!(&mut out, "{}", name)?;
    }
    writeln!(&mut out)?;

    // Rows
    for (i, row) in mat.iter().enumerate() {
        write!(&mut out, "{}", names[i])?;
        for val in row {
            write!(&mut out, "\t{}", val)?;
        }
        writeln!(&mut out)?;
    }

    out.flush()?;
    Ok(())
}

/// One row per compared pair: both tree names, then one column per metric.
pub fn write_pairs_tsv<P: AsRef<Path>>(
    path: P,
    columns: &[&str],
    rows: &[(String, String, Vec<f64>)],
) -> io::Result<()> {
    let mut out = open_output(path.as_ref())?;

    write!(&mut out, "first\tsecond")?;
    for col in columns {
        write!(&mut out, "\t{col}")?;
    }
    writeln!(&mut out)?;

    for (first, second, values) in rows {
        write!(&mut out, "{first}\t{second}")?;
        for val in values {
            write!(&mut out, "\t{val}")?;
        }
        writeln!(&mut out)?;
    }

    out.flush()?;
    Ok(())
}

/// One block per compared pair:
///
/// ```text
/// # <first>\t<second>\t<metric>\t<total cost>
/// <node of first>\t<node of second>\t<cost>
/// ...
/// ```
///
/// Nodes are printed as leaf names or sorted leaf sets; `-` marks a node
/// paired with nothing.
pub fn write_alignments<P: AsRef<Path>>(
    path: P,
    entries: &[(String, String, &str, &AlignmentReport)],
) -> io::Result<()> {
    let mut out = open_output(path.as_ref())?;
    for (first, second, metric, report) in entries {
        writeln!(&mut out, "# {first}\t{second}\t{metric}\t{}", report.total_cost)?;
        for line in &report.lines {
            writeln!(&mut out, "{}\t{}\t{}", line.first, line.second, line.cost)?;
        }
        writeln!(&mut out)?;
    }
    out.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::LabelledPair;
    use std::path::PathBuf;

    const BEAST: &str = "#NEXUS

Begin taxa;
\tDimensions ntax=4;
End;

Begin trees;
\tTranslate
\t\t1 'Alpha',
\t\t2 'Beta',
\t\t3 'Gamma',
\t\t4 'Delta'
\t\t;
tree STATE_0 = ((1:[&rate=0.5]1.0,2:1.0):1.0,(3:1.0,4:1.0):1.0);
tree STATE_1000 = ((1:1.0,3:1.0):1.0,(2:1.0,4:1.0):1.0);
tree STATE_2000 = ((1:1.0,4:1.0):1.0,(2:1.0,3:1.0):1.0);
End;
";

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("mtd_io_{}_{name}", std::process::id()))
    }

    fn leaf_names(tree: &Tree) -> Vec<String> {
        let mut names: Vec<String> = tree
            .get_leaves()
            .iter()
            .filter_map(|&id| tree.get(&id).ok()?.name.clone())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_strip_comments() {
        assert_eq!(strip_comments("(A:[&rate=1]0.5,B[x]);"), "(A:0.5,B);");
        assert_eq!(strip_comments("[outer [inner]]((A,B),C);"), "((A,B),C);");
    }

    #[test]
    fn test_extract_state() {
        assert_eq!(extract_state("tree STATE_2500"), 2500);
        assert_eq!(extract_state("tree state_7 [&lnP=-1]"), 7);
        assert_eq!(extract_state("tree t1"), 0);
    }

    #[test]
    fn test_beast_translate_and_burnin() {
        let (taxons, trees) = parse_beast_content(BEAST, "run", 0, 0, true);
        assert_eq!(taxons.len(), 4);
        assert_eq!(taxons["3"], "Gamma");
        assert_eq!(trees.len(), 3);
        assert_eq!(trees[1].0, "run_tree_STATE1000");
        assert_eq!(leaf_names(&trees[0].1), vec!["Alpha", "Beta", "Delta", "Gamma"]);

        let (_, trees) = parse_beast_content(BEAST, "run", 1, 0, false);
        assert_eq!(trees.len(), 2);
        assert_eq!(leaf_names(&trees[0].1), vec!["1", "2", "3", "4"]);

        let (_, trees) = parse_beast_content(BEAST, "run", 0, 1000, true);
        assert_eq!(trees.len(), 1);
        assert_eq!(trees[0].0, "run_tree_STATE2000");
    }

    #[test]
    fn test_newick_lines() {
        let content = "((A,B),(C,D));\n((A,C),\n (B,D));\n\n(A,B,(C,D)); [last]\n";
        let trees = parse_newick_content(content, "set", 0);
        assert_eq!(trees.len(), 3);
        assert_eq!(trees[1].0, "set_tree2");
        assert_eq!(leaf_names(&trees[1].1), vec!["A", "B", "C", "D"]);

        let trees = parse_newick_content(content, "set", 2);
        assert_eq!(trees.len(), 1);
        assert_eq!(trees[0].0, "set_tree3");
    }

    #[test]
    fn test_read_trees_detects_format() {
        let nexus = scratch("run.trees");
        fs::write(&nexus, BEAST).unwrap();
        let trees = read_trees(&nexus, 0, 0, true).unwrap();
        assert_eq!(trees.len(), 3);
        assert!(trees[0].0.ends_with("_tree_STATE0"));

        let (taxons, _) = read_beast_trees(&nexus, 0, 0, true).unwrap();
        assert_eq!(taxons.len(), 4);

        let newick = scratch("set.nwk.gz");
        let mut enc = GzEncoder::new(File::create(&newick).unwrap(), Compression::default());
        enc.write_all(b"((A,B),(C,D));\n((A,C),(B,D));\n").unwrap();
        enc.finish().unwrap();
        let trees = read_trees(&newick, 0, 0, false).unwrap();
        assert_eq!(trees.len(), 2);
        assert!(trees[0].0.ends_with("set_tree1"));

        let empty = scratch("empty.nwk");
        fs::write(&empty, "\n").unwrap();
        assert!(matches!(read_trees(&empty, 0, 0, false), Err(CompareError::NoTrees(_))));

        for p in [nexus, newick, empty] {
            let _ = fs::remove_file(p);
        }
    }

    #[test]
    fn test_write_matrix_and_pairs() {
        let path = scratch("matrix.tsv.gz");
        let names = vec!["t1".to_string(), "t2".to_string()];
        write_matrix_tsv(&path, &names, &[vec![0.0, 1.5], vec![1.5, 0.0]]).unwrap();
        let text = read_text(&path).unwrap();
        assert_eq!(text, "\tt1\tt2\nt1\t0\t1.5\nt2\t1.5\t0\n");
        let _ = fs::remove_file(path);

        let path = scratch("pairs.tsv");
        let rows = vec![("ref".to_string(), "t1".to_string(), vec![2.0, 1.0])];
        write_pairs_tsv(&path, &["ms", "rf"], &rows).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "first\tsecond\tms\trf\nref\tt1\t2\t1\n");
        let _ = fs::remove_file(path);
    }

    #[test]
    fn test_write_alignments() {
        let report = AlignmentReport {
            lines: vec![
                LabelledPair { first: "(D,E)".into(), second: "(D,E)".into(), cost: 0 },
                LabelledPair { first: "(C,D,E)".into(), second: "-".into(), cost: 3 },
            ],
            total_cost: 3,
        };
        let path = scratch("align.txt");
        write_alignments(&path, &[("t1".into(), "t2".into(), "mc", &report)]).unwrap();
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "# t1\tt2\tmc\t3\n(D,E)\t(D,E)\t0\n(C,D,E)\t-\t3\n\n"
        );
        let _ = fs::remove_file(path);
    }
}
