use clap::{Parser, Subcommand};
use imageprep::batch::BatchCoordinator;
use imageprep::profile::{self, Profile};
use imageprep::transcode::{ImageCrateBackend, centered_crop};
use imageprep::types::IncomingFile;
use imageprep::{output, pipeline, validate};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "imageprep")]
#[command(version)]
#[command(about = "Validate, compress, and crop storefront images in batches")]
#[command(long_about = "\
Validate, compress, and crop storefront images in batches

Every upload site gets a named profile bundling its constraints: byte
budget, accepted formats, output pixel bounds, encoding quality, advisory
aspect ratio, crop policy, and cardinality. Files run through a single
pipeline parameterized by that profile:

  validate → compress → (centered crop, if the profile requires one) → write

Built-in profiles: product-gallery, banner, logo, avatar. Run
'imageprep profiles' to inspect them, or 'imageprep gen-profiles' to
print a documented profiles.toml to customize and pass via --profiles.

Directory arguments are walked recursively; only files with a known
raster extension (jpg, jpeg, png, gif, webp) are picked up.")]
struct Cli {
    /// TOML file with custom [profiles.<name>] tables
    #[arg(long, global = true)]
    profiles: Option<PathBuf>,

    /// Worker threads for batch processing (defaults to all cores)
    #[arg(long, global = true)]
    threads: Option<usize>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Validate files against a profile without transcoding
    Check {
        /// Files or directories to check
        paths: Vec<PathBuf>,
        /// Profile name (built-in or from --profiles)
        #[arg(long, default_value = "product-gallery")]
        profile: String,
    },
    /// Run the full pipeline and write artifacts plus outcomes.json
    Process {
        /// Files or directories to process
        paths: Vec<PathBuf>,
        #[arg(long, default_value = "product-gallery")]
        profile: String,
        /// Output directory for artifacts and the manifest
        #[arg(long, default_value = "prepared")]
        out: PathBuf,
    },
    /// List available profiles and their constraints
    Profiles,
    /// Print a documented stock profiles.toml
    GenProfiles,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Some(threads) = cli.threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .build_global()
            .ok();
    }

    match cli.command {
        Command::Check { paths, profile } => {
            let profile = profile::resolve_profile(&profile, cli.profiles.as_deref())?;
            let files = collect_files(&paths)?;
            let rejected = run_check(&files, &profile);
            if rejected > 0 {
                eprintln!("{rejected} of {} file(s) rejected", files.len());
                std::process::exit(1);
            }
            println!("{} file(s) pass profile {:?}", files.len(), profile.name);
        }
        Command::Process {
            paths,
            profile,
            out,
        } => {
            let profile = profile::resolve_profile(&profile, cli.profiles.as_deref())?;
            let files = collect_files(&paths)?;
            run_process(files, profile, &out)?;
        }
        Command::Profiles => {
            let mut profiles = Profile::presets();
            if let Some(path) = cli.profiles.as_deref() {
                profiles.extend(profile::load_profiles(path)?);
            }
            output::print_profiles(&profiles);
        }
        Command::GenProfiles => {
            print!("{}", profile::stock_profiles_toml());
        }
    }

    Ok(())
}

/// Expand files and directories into `IncomingFile`s. Directories are
/// walked recursively, picking up only known raster extensions; files
/// named explicitly are always ingested and left to the validator.
fn collect_files(paths: &[PathBuf]) -> Result<Vec<IncomingFile>, std::io::Error> {
    let mut files = Vec::new();
    for path in paths {
        if path.is_dir() {
            for entry in walkdir::WalkDir::new(path)
                .sort_by_file_name()
                .into_iter()
                .filter_map(Result::ok)
                .filter(|e| e.file_type().is_file())
            {
                let ext = extension_of(entry.path());
                if profile::parse_format(&ext).is_some() {
                    files.push(read_file(entry.path(), ext)?);
                }
            }
        } else {
            let ext = extension_of(path);
            files.push(read_file(path, ext)?);
        }
    }
    Ok(files)
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase()
}

fn read_file(path: &Path, declared_format: String) -> Result<IncomingFile, std::io::Error> {
    let bytes = std::fs::read(path)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok(IncomingFile::new(name, declared_format, bytes))
}

/// Validate-only pass; returns the number of rejected files.
fn run_check(files: &[IncomingFile], profile: &Profile) -> usize {
    let backend = ImageCrateBackend::new();
    let mut rejected = 0;

    for (pos, file) in files.iter().enumerate() {
        let report = validate::validate(&backend, file, profile);
        println!("{:0>3} {}", pos + 1, file.name);
        if report.is_ok() {
            println!("    ok");
        } else {
            rejected += 1;
            for reason in &report.reasons {
                println!("    {reason}");
            }
        }
        for warning in &report.warnings {
            println!("    warning: {warning}");
        }
    }
    rejected
}

#[derive(serde::Serialize)]
struct Manifest {
    profile: String,
    artifacts: Vec<ManifestArtifact>,
    rejected: Vec<ManifestRejection>,
    failed: Vec<ManifestFailure>,
}

#[derive(serde::Serialize)]
struct ManifestArtifact {
    file: String,
    source: String,
    width: u32,
    height: u32,
    original_size: u64,
    final_size: u64,
    crop_applied: bool,
}

#[derive(serde::Serialize)]
struct ManifestRejection {
    source: String,
    reasons: Vec<String>,
}

#[derive(serde::Serialize)]
struct ManifestFailure {
    source: String,
    error: String,
}

/// Full pipeline over the collected files, batched to the profile's
/// capacity, writing artifacts and an `outcomes.json` manifest.
fn run_process(
    files: Vec<IncomingFile>,
    profile: Profile,
    out: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    std::fs::create_dir_all(out)?;

    let (tx, rx) = std::sync::mpsc::channel();
    let printer = std::thread::spawn(move || {
        for event in rx {
            if let Some(line) = output::format_event(&event) {
                println!("{line}");
            }
        }
    });

    let mut manifest = Manifest {
        profile: profile.name.clone(),
        artifacts: Vec::new(),
        rejected: Vec::new(),
        failed: Vec::new(),
    };
    let mut all_artifacts = Vec::new();
    let mut all_rejections = Vec::new();
    let mut all_failures = Vec::new();
    let mut written = 0usize;

    // The CLI drives one upload site per chunk: a single-item profile
    // processes files one at a time, a gallery up to its max.
    let chunk_size = if profile.multiple {
        profile.max_items
    } else {
        1
    };

    let files_chunks: Vec<Vec<IncomingFile>> = files
        .chunks(chunk_size)
        .map(|chunk| chunk.to_vec())
        .collect();

    for chunk in files_chunks {
        let backend = ImageCrateBackend::new();
        let mut batch = BatchCoordinator::with_events(backend, profile.clone(), tx.clone());
        batch.add_files(chunk)?;

        if profile.required_crop {
            apply_centered_crops(&mut batch)?;
        }

        for artifact in batch.artifacts() {
            written += 1;
            let stem = Path::new(&artifact.name)
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| format!("image-{written}"));
            let file_name = format!("{written:03}-{stem}.jpg");
            std::fs::write(out.join(&file_name), &artifact.bytes)?;

            manifest.artifacts.push(ManifestArtifact {
                file: file_name,
                source: artifact.name.clone(),
                width: artifact.width,
                height: artifact.height,
                original_size: artifact.original_size,
                final_size: artifact.final_size,
                crop_applied: artifact.crop_applied,
            });
            all_artifacts.push(artifact);
        }

        for rejection in batch.rejections() {
            manifest.rejected.push(ManifestRejection {
                source: rejection.name.clone(),
                reasons: rejection.reasons.iter().map(|r| r.to_string()).collect(),
            });
            all_rejections.push(rejection.clone());
        }
        for (name, error) in batch.failures() {
            manifest.failed.push(ManifestFailure {
                source: name.clone(),
                error: error.clone(),
            });
            all_failures.push((name.clone(), error.clone()));
        }
    }

    std::fs::write(
        out.join("outcomes.json"),
        serde_json::to_string_pretty(&manifest)?,
    )?;

    drop(tx);
    printer.join().expect("printer thread panicked");

    output::print_summary(&all_artifacts, &all_rejections, &all_failures);
    println!("Wrote {written} artifact(s) to {}", out.display());
    Ok(())
}

/// Satisfy a required crop non-interactively: the largest centered region
/// at the profile's aspect ratio (square when none is set).
fn apply_centered_crops<B: imageprep::transcode::RasterBackend>(
    batch: &mut BatchCoordinator<B>,
) -> Result<(), Box<dyn std::error::Error>> {
    let aspect = batch.profile().aspect_ratio.unwrap_or(1.0);
    let awaiting: Vec<_> = batch
        .items()
        .iter()
        .filter(|item| item.stage == pipeline::Stage::AwaitingCrop)
        .map(|item| (item.id, item.source_dimensions))
        .collect();

    for (id, dims) in awaiting {
        let Some(dims) = dims else {
            // No source dimensions means the probe failed after a
            // successful decode — nothing sensible to crop against.
            continue;
        };
        batch.open_crop(id)?;
        batch.apply_crop(id, centered_crop(dims.as_tuple(), aspect))?;
    }
    Ok(())
}
