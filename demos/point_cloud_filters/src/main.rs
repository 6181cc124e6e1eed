use argh::FromArgs;
use std::path::PathBuf;

use cloudscope::k3d;
use cloudscope::k3d::io::AsciiXyzLoader;
use cloudscope::k3d::session::{Session, SessionConfig};

#[derive(FromArgs)]
/// Load or generate a point cloud and run the neighborhood filters on it
struct Args {
    /// path to an ascii xyz file; repeat to append more files
    #[argh(option)]
    input: Vec<PathBuf>,

    /// path to a json file with the session parameters
    #[argh(option)]
    config: Option<PathBuf>,

    /// neighborhood radius for smoothing
    #[argh(option)]
    smooth_radius: Option<f64>,

    /// minimum spacing kept by thinning
    #[argh(option)]
    thin_radius: Option<f64>,

    /// neighborhood radius for normal estimation
    #[argh(option)]
    normal_radius: Option<f64>,

    /// lattice steps per edge of the generated cube
    #[argh(option)]
    grid_resolution: Option<usize>,

    /// color the points by their distance to the best fit plane
    #[argh(switch)]
    plane: bool,

    /// undo the thinning before writing the output
    #[argh(switch)]
    undo: bool,

    /// path to write the resulting cloud to
    #[argh(option)]
    output: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    let mut config = match &args.config {
        Some(path) => {
            let file = std::fs::File::open(path)?;
            serde_json::from_reader(std::io::BufReader::new(file))?
        }
        None => SessionConfig::default(),
    };
    if let Some(radius) = args.smooth_radius {
        config.smooth_radius = radius;
    }
    if let Some(radius) = args.thin_radius {
        config.thin_radius = radius;
    }
    if let Some(radius) = args.normal_radius {
        config.normal_radius = radius;
    }
    if let Some(resolution) = args.grid_resolution {
        config.grid_resolution = resolution;
    }
    log::debug!("session config: {:?}", config);

    let mut session = Session::new(config.clone());

    if args.input.is_empty() {
        session.load_grid(config.grid_resolution, config.grid_size);
    }
    for (i, path) in args.input.iter().enumerate() {
        session.load(&AsciiXyzLoader, path, i > 0)?;
    }
    println!("Loaded cloud: #{} points", session.current().len());

    let tree = session.ensure_tree();
    println!("Built kd-tree: #{} nodes, depth {}", tree.node_count(), tree.depth());

    if let Some((min, max)) = session.current().bounds() {
        println!("Bounds: {:?} - {:?}", min, max);
    }

    let failed = session.estimate_normals(config.normal_radius)?;
    println!(
        "Estimated normals: #{} of {} points without normal",
        failed,
        session.current().len()
    );

    session.smooth(config.smooth_radius)?;
    println!("Smoothed with radius {}", config.smooth_radius);

    let removed = session.thin(config.thin_radius)?;
    println!(
        "Thinned with radius {}: removed #{} points, #{} left",
        config.thin_radius,
        removed,
        session.current().len()
    );

    if args.plane {
        let fitted = session.best_fit_plane(true)?;
        println!(
            "Best fit plane: center {:?}, normal {:?}, extent {:?}",
            fitted.center,
            fitted.normal,
            fitted.extent()
        );
    }

    if args.undo && session.undo() {
        println!("Undid thinning: #{} points", session.current().len());
    }

    if let Some(path) = &args.output {
        k3d::io::write_xyz_ascii(path, session.current())?;
        println!("Wrote #{} points to {}", session.current().len(), path.display());
    }

    Ok(())
}
