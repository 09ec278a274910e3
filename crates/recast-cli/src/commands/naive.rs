//! `recast naive`: build the star-shaped baseline network.

use std::path::Path;

use recast::cascade::CascadeTable;
use recast::graph::naive_network;
use recast::store::{self, StoreLayout};

use super::{require_file, GlobalFlags};
use crate::error::Result;
use crate::output;

pub(crate) fn run(data_dir: &Path, events: &Path, flags: GlobalFlags) -> Result<()> {
    require_file(events)?;

    let mut table = CascadeTable::load_csv(events)?;
    let cleaning = table.retain_reconstructible();

    let network = naive_network(&table);
    let layout = StoreLayout::new(data_dir);
    let path = layout.naive_network_path();
    store::write_network(&path, &network)?;

    if flags.json {
        println!(
            "{}",
            serde_json::json!({
                "path": path,
                "nodes": network.num_nodes(),
                "edges": network.num_edges(),
                "cascades": cleaning.kept,
            })
        );
    } else if !flags.quiet {
        output::section("Naive network");
        output::kv("path", path.display());
        output::kv("nodes", network.num_nodes());
        output::kv("edges", network.num_edges());
        output::kv("cascades", cleaning.kept);
    }
    Ok(())
}
