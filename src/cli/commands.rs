//! Command handler implementations
//!
//! This module contains the implementation of all CLI commands.

use crate::cli::progress::{
    format_bytes, print_divider, print_header, print_info, print_success, print_warning,
    ScanSpinner, SignatureProgressBar,
};
use crate::cli::{Args, Commands};
use crate::core::config::{get_config_path, init_config, Config};
use crate::core::store::MetadataStore;
use crate::duplicate::{
    duplicate_groups, format_histogram, group_size_histogram, label_groups,
    propagate_camera_models, undated_groups, DuplicateGroup, DuplicateManager, PassStats,
    SignatureComputer,
};
use crate::library::scanner::scan_library;
use crate::library::Library;
use crate::sync::{build_sync_id_maps, SetComparator, SyncIdCache};
use anyhow::{bail, Context, Result};
use log::{debug, info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Run the appropriate command based on CLI arguments
pub fn run_command(args: &Args, config: &Config, shutdown_flag: Arc<AtomicBool>) -> Result<()> {
    match &args.command {
        Commands::Scan { dir, full } => {
            scan_command(config, dir, *full, &shutdown_flag)?;
        }
        Commands::Compare { a, b, exact } => {
            compare_command(config, a, b, *exact, &shutdown_flag)?;
        }
        Commands::SyncIds {
            a,
            b,
            cache,
            output,
        } => {
            let cache_path = cache.clone().unwrap_or_else(|| config.sync.cache_file.clone());
            sync_ids_command(config, a, b, &cache_path, output.as_deref(), &shutdown_flag)?;
        }
        Commands::Config { path, reset } => {
            handle_config_command(*path, *reset)?;
        }
        Commands::GenerateConfig { output } => {
            generate_config_file(output.clone())?;
        }
        Commands::ShowConfig => {
            show_config(config);
        }
    }

    Ok(())
}

// ============================================================================
// Library loading
// ============================================================================

/// Display name of a library: its directory name
fn library_name(root: &Path) -> String {
    root.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| root.display().to_string())
}

/// Scan a library directory, seeded from its metadata store
fn open_library(config: &Config, root: &Path) -> Result<Library> {
    if !root.is_dir() {
        bail!("Library directory not found: {}", root.display());
    }

    let name = library_name(root);
    let store = MetadataStore::load_or_default(&config.library.metadata_path(root));
    debug!("{}: {} stored entries", name, store.len());

    let spinner = ScanSpinner::new(&name);
    match scan_library(&name, root, &config.library, &store) {
        Ok((library, stats)) => {
            spinner.finish(stats.files, stats.undated);
            if stats.errors > 0 {
                print_warning(&format!("{} file(s) could not be read", stats.errors));
            }
            Ok(library)
        }
        Err(e) => {
            spinner.finish_with_error(&e.to_string());
            Err(e).with_context(|| format!("Failed to scan {}", root.display()))
        }
    }
}

/// Compute the signatures a library needs, then propagate camera models
fn resolve_library(
    config: &Config,
    library: &mut Library,
    full: bool,
    shutdown_flag: &AtomicBool,
) -> Result<PassStats> {
    let manager = DuplicateManager::with_computer(SignatureComputer::new(config.signature.clone()));
    let bar = SignatureProgressBar::new();

    let stats = if full {
        manager.compute_all(library, shutdown_flag, |p| bar.update(p))?
    } else {
        manager.resolve(library, shutdown_flag, |p| bar.update(p))?
    };

    if stats.interrupted {
        bar.finish_interrupted();
    } else {
        bar.finish();
    }
    if stats.fell_back > 0 {
        bar.log(&format!(
            "⚠ {} file(s) could not be decoded, compared by size instead",
            stats.fell_back
        ));
    }

    let propagated = propagate_camera_models(library)?;
    if propagated > 0 {
        debug!("Camera model copied within {} duplicate group(s)", propagated);
    }
    Ok(stats)
}

/// Persist what was learned about a library
fn save_library(config: &Config, library: &Library) -> Result<()> {
    let Some(root) = library.root() else {
        return Ok(());
    };
    let path = config.library.metadata_path(root);
    MetadataStore::from_library(library)
        .save(&path)
        .with_context(|| format!("Failed to save metadata for {}", library.name()))?;
    Ok(())
}

/// Open, resolve and save in one go
fn prepare_library(
    config: &Config,
    root: &Path,
    full: bool,
    shutdown_flag: &AtomicBool,
) -> Result<Library> {
    let mut library = open_library(config, root)?;
    let stats = resolve_library(config, &mut library, full, shutdown_flag)?;
    save_library(config, &library)?;

    if stats.interrupted || shutdown_flag.load(Ordering::SeqCst) {
        bail!("Interrupted, progress saved for {}", library.name());
    }
    Ok(library)
}

// ============================================================================
// scan
// ============================================================================

fn scan_command(config: &Config, dir: &Path, full: bool, shutdown_flag: &AtomicBool) -> Result<()> {
    print_header(&format!("Duplicates in {}", library_name(dir)));

    let library = prepare_library(config, dir, full, shutdown_flag)?;

    let mut groups = duplicate_groups(&library);
    groups.extend(undated_groups(&library));
    let duplicates: Vec<DuplicateGroup> =
        groups.iter().filter(|g| g.is_duplicate()).cloned().collect();

    print_divider();
    if duplicates.is_empty() {
        print_success("No duplicates found");
    } else {
        for (group, labels) in duplicates.iter().zip(label_groups(&library, &duplicates)) {
            let date = group
                .date
                .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "undated".to_string());
            println!("  Group {} ({}, {} files)", labels[0].group, date, group.len());
            for label in &labels {
                println!("    {:>6}  {}", label.to_string(), label.id);
            }
        }
    }

    print_divider();
    for line in format_histogram(&group_size_histogram(&groups)) {
        print_info(&line);
    }

    let redundant = redundant_bytes(&library, &duplicates);
    println!();
    print_success(&format!(
        "{} files, {} duplicate groups, {} in redundant copies",
        library.len(),
        duplicates.len(),
        format_bytes(redundant)
    ));
    Ok(())
}

/// Bytes taken by every member beyond the first of each group
fn redundant_bytes(library: &Library, groups: &[DuplicateGroup]) -> u64 {
    groups
        .iter()
        .flat_map(|g| g.members.iter().skip(1))
        .filter_map(|id| library.record(id).and_then(|r| r.file_size))
        .sum()
}

// ============================================================================
// compare
// ============================================================================

fn compare_command(
    config: &Config,
    a: &Path,
    b: &Path,
    exact: bool,
    shutdown_flag: &AtomicBool,
) -> Result<()> {
    print_header(&format!("{} vs {}", library_name(a), library_name(b)));

    // Storage identity needs no signatures
    let (library_a, library_b) = if exact {
        (open_library(config, a)?, open_library(config, b)?)
    } else {
        (
            prepare_library(config, a, false, shutdown_flag)?,
            prepare_library(config, b, false, shutdown_flag)?,
        )
    };
    let comparator = SetComparator::new(&library_a, &library_b);

    print_divider();
    if exact {
        let comparison = comparator.exact_cmp();
        for id in &comparison.only_in_a {
            println!("    {}", id);
        }
        println!();
        print_info(&format!("{} file(s) in both", comparison.in_both.len()));
        print_info(&format!(
            "{} file(s) only in {}",
            comparison.only_in_a.len(),
            library_a.name()
        ));
    } else {
        let comparison = comparator.cmp();
        for group in &comparison.only_in_a {
            println!("    {}", group.members.join(", "));
        }
        println!();
        print_info(&format!(
            "{} file(s) in {} groups present in both",
            comparison.records_in_both(),
            comparison.in_both.len()
        ));
        print_info(&format!(
            "{} file(s) in {} groups only in {}",
            comparison.records_only_in_a(),
            comparison.only_in_a.len(),
            library_a.name()
        ));
    }
    Ok(())
}

// ============================================================================
// sync-ids
// ============================================================================

fn sync_ids_command(
    config: &Config,
    a: &Path,
    b: &Path,
    cache_path: &Path,
    output: Option<&Path>,
    shutdown_flag: &AtomicBool,
) -> Result<()> {
    let library_a = prepare_library(config, a, false, shutdown_flag)?;
    let library_b = prepare_library(config, b, false, shutdown_flag)?;

    let mut cache = SyncIdCache::load_or_default(cache_path);
    let known = cache.len();
    let maps = build_sync_id_maps(&library_a, &library_b, &mut cache, &config.sync.video_prefix);
    cache
        .save(cache_path)
        .with_context(|| format!("Failed to save sync id cache {}", cache_path.display()))?;
    info!(
        "Sync id cache: {} known before, {} now",
        known,
        cache.len()
    );

    let json = serde_json::to_string_pretty(&maps)?;
    match output {
        Some(path) => {
            fs::write(path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            print_success(&format!(
                "Wrote {} + {} sync ids to {}",
                maps.a.len(),
                maps.b.len(),
                path.display()
            ));
        }
        None => println!("{}", json),
    }
    Ok(())
}

// ============================================================================
// Configuration commands
// ============================================================================

/// Handle the `config` command - show path, reset, or print the config file
pub fn handle_config_command(show_path: bool, reset: bool) -> Result<()> {
    if reset {
        if let Some(config_path) = get_config_path() {
            if config_path.exists() {
                fs::remove_file(&config_path)?;
                info!("Removed existing config file");
            }
        }
        let path = init_config()?;
        info!("Created fresh config file at: {}", path.display());
        return Ok(());
    }

    let path = Config::get_active_config_path();
    if show_path {
        println!("{}", path.display());
        if path.exists() {
            info!("Config file exists at: {}", path.display());
        } else {
            info!("Config file would be created at: {}", path.display());
        }
        return Ok(());
    }

    let path = if path.exists() { path } else { init_config()? };
    let content = fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    info!("Config file: {}", path.display());
    println!("{}", content);
    Ok(())
}

/// Generate a configuration file at the specified or default location
pub fn generate_config_file(output: Option<PathBuf>) -> Result<()> {
    let output_path = match output {
        Some(path) => {
            if path.exists() {
                warn!("Overwriting {}", path.display());
            }
            fs::write(&path, Config::generate_default_config())?;
            path
        }
        None => init_config()?,
    };

    info!("Configuration file: {}", output_path.display());
    info!("Edit this file to customize scanning and sync settings.");
    Ok(())
}

/// Show the current configuration settings
pub fn show_config(config: &Config) {
    let config_path = Config::get_active_config_path();
    info!("Configuration file: {}", config_path.display());
    if !config_path.exists() {
        info!("(Using default settings - no config file found)");
    }
    info!("");
    info!("Current Configuration:");
    info!("----------------------");
    info!("[library]");
    info!("  metadata_file = \"{}\"", config.library.metadata_file);
    info!("  follow_symlinks = {}", config.library.follow_symlinks);
    info!("  media_only = {}", config.library.media_only);
    info!("");
    info!("[signature]");
    info!("  hash_algorithm = {:?}", config.signature.hash_algorithm);
    info!("  hash_non_images = {}", config.signature.hash_non_images);
    info!("  parallel = {}", config.signature.parallel);
    info!("");
    info!("[sync]");
    info!("  cache_file = \"{}\"", config.sync.cache_file.display());
    info!("  video_prefix = \"{}\"", config.sync.video_prefix);
    info!("");
    info!("[logging]");
    info!("  level = \"{}\"", config.logging.level);
    info!("  log_to_file = {}", config.logging.log_to_file);
    info!("  log_file = \"{}\"", config.logging.log_file.display());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::fixtures::{self, day};
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    fn write_png(path: &Path, shade: u8) {
        RgbImage::from_fn(16, 16, |x, y| {
            Rgb([shade.wrapping_add((x * y) as u8), shade, 255 - shade])
        })
        .save(path)
        .unwrap();
    }

    #[test]
    fn test_redundant_bytes_skips_first_member() {
        let mut library = Library::new("A");
        library.insert(fixtures::image("a.jpg", Some(day(1)), 100, None)).unwrap();
        library.insert(fixtures::image("b.jpg", Some(day(1)), 100, None)).unwrap();
        library.insert(fixtures::image("c.jpg", Some(day(1)), 100, None)).unwrap();

        let groups = duplicate_groups(&library);
        assert_eq!(redundant_bytes(&library, &groups), 200);
    }

    #[test]
    fn test_prepare_library_saves_store() {
        let temp_dir = TempDir::new().unwrap();
        let root = temp_dir.path().join("Photos");
        fs::create_dir_all(&root).unwrap();
        write_png(&root.join("IMG_20240501_120000.png"), 10);
        write_png(&root.join("IMG_20240501_120000_copy.png"), 10);
        fs::write(root.join("notes.txt"), "not media").unwrap();

        let config = Config::default();
        let shutdown = AtomicBool::new(false);
        let library = prepare_library(&config, &root, false, &shutdown).unwrap();

        assert_eq!(library.name(), "Photos");
        assert_eq!(library.len(), 2);
        let store = MetadataStore::load(&config.library.metadata_path(&root)).unwrap();
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_prepare_library_reports_interruption() {
        let temp_dir = TempDir::new().unwrap();
        let shutdown = AtomicBool::new(true);
        let result = prepare_library(&Config::default(), temp_dir.path(), false, &shutdown);
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_library_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let missing = temp_dir.path().join("nope");
        assert!(open_library(&Config::default(), &missing).is_err());
    }

    #[test]
    fn test_sync_ids_writes_output_and_cache() {
        let temp_dir = TempDir::new().unwrap();
        let a = temp_dir.path().join("a");
        let b = temp_dir.path().join("b");
        fs::create_dir_all(&a).unwrap();
        fs::create_dir_all(&b).unwrap();
        write_png(&a.join("20240501_120000.png"), 40);
        write_png(&b.join("20240501_120000.png"), 40);

        let cache_path = temp_dir.path().join("ids.json");
        let output = temp_dir.path().join("maps.json");
        let shutdown = AtomicBool::new(false);

        sync_ids_command(
            &Config::default(),
            &a,
            &b,
            &cache_path,
            Some(&output),
            &shutdown,
        )
        .unwrap();

        let maps: crate::sync::SyncIdMaps =
            serde_json::from_str(&fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(maps.a.get("1.1").map(String::as_str), Some("20240501_120000.png"));
        assert_eq!(maps.b.get("1.2").map(String::as_str), Some("20240501_120000.png"));
        assert!(cache_path.exists());
    }
}
