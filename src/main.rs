use image::error::ImageError;

use quadpress::QuadTree;
use quadpress::error::{DecodeError, LoadError};
use quadpress::grid::PixelGrid;

/// Helper function for `main`.
fn error_exit(msg: &str, code: i32) -> ! {
	eprintln!("{}", msg);
	std::process::exit(code)
}

/// Replaces everything past the last dot of `path` (or appends, when
/// there is no dot) with `ext`.
fn swap_extension(path: &str, ext: &str) -> String {
	// `rsplitn` yields at least one item even for an empty path.
	path.rsplitn(2, '.').last().unwrap().to_string() + "." + ext
}

/// `clap`-based CLI for working with QUAD files.
///
/// May exit process with status code if there are errors:
///
/// 2: invalid arguments (including `clap` usage errors)
///
/// 3: file I/O issues
///
/// 4: invalid image data
///
/// 5: computation limits exceeded
///
/// 10: other, potentially unknown error
fn main() {
	env_logger::init();
	let clap_matches = clap::Command::new("quadpress")
		.version("0.1.0")
		.about("Converts images to and from a region-quadtree compression format (QUAD).")
		.arg(clap::Arg::new("into")
			.short('i')
			.long("into")
			.action(clap::ArgAction::SetTrue)
			.help("Compress the input image file into a QUAD file"))
		.arg(clap::Arg::new("from")
			.short('f')
			.long("from")
			.action(clap::ArgAction::SetTrue)
			.help("Render the input QUAD file back into a PNG"))
		.arg(clap::Arg::new("accuracy")
			.short('a')
			.long("accuracy")
			.value_name("N")
			.help("Homogeneity threshold, clamped to 0..1 (--into only); defaults to 0.9"))
		.arg(clap::Arg::new("level")
			.short('l')
			.long("level")
			.value_name("N")
			.help("Detail level to render (--from only); defaults to full detail"))
		.arg(clap::Arg::new("divisions")
			.short('d')
			.long("divisions")
			.action(clap::ArgAction::SetTrue)
			.help("Outline region divisions in the rendered image (--from only)"))
		.arg(clap::Arg::new("INPUT")
			.required(true)
			.help("Path to input file"))
		.arg(clap::Arg::new("OUTPUT")
			.help("Path to output file; defaults to INPUT with a swapped extension"))
		.get_matches();

	let (into, from) = (clap_matches.get_flag("into"), clap_matches.get_flag("from"));
	match (into, from) {
		(true, true) => error_exit("Only one of -i/--into and -f/--from must be present", 2),
		(true, false) => {
			let input_path = clap_matches.get_one::<String>("INPUT").unwrap();
			let grid = match PixelGrid::open(input_path) {
				Ok(g) => g,
				Err(e) => {
					let (msg, code) = match e {
						LoadError::Decode(ImageError::Decoding(_)) => ("Invalid image data", 4),
						LoadError::Decode(ImageError::Limits(_)) => ("Computation limits exceeded", 5),
						LoadError::Decode(ImageError::IoError(_)) => ("File not found or could not be read", 3),
						LoadError::Decode(_) => ("An error occurred", 10),
						LoadError::EmptyImage => ("Invalid image data", 4)
					};
					error_exit(msg, code)
				}
			};
			let accuracy_raw = clap_matches.get_one::<String>("accuracy")
				.map(String::as_str)
				.unwrap_or("0.9");
			let accuracy = match accuracy_raw.parse::<f64>() {
				Ok(n) if n.is_nan() => error_exit("Non-numeric value for accuracy", 2),
				Ok(n) => n.clamp(0.0, 1.0),
				Err(_) => error_exit("Non-numeric value for accuracy", 2)
			};
			let tree = QuadTree::from_grid(&grid, accuracy);
			log::info!(
				"compressed {}x{} pixels into {} regions ({} leaves) at accuracy {}",
				tree.image_width(),
				tree.image_height(),
				tree.root().node_count(),
				tree.root().leaf_count(),
				tree.accuracy()
			);
			let output_path = match clap_matches.get_one::<String>("OUTPUT") {
				Some(p) => p.clone(),
				None => swap_extension(input_path, "quad")
			};
			match tree.save_quad(&output_path) {
				Ok(_) => (),
				Err(_) => error_exit("Could not write to output file", 3)
			}
		},
		(false, true) => {
			let input_path = clap_matches.get_one::<String>("INPUT").unwrap();
			let tree = match QuadTree::load_quad(input_path) {
				Ok(t) => t,
				Err(e) => {
					let (msg, code) = match e {
						DecodeError::Io(_) => ("File not found or could not be read", 3),
						_ => ("Invalid image data", 4)
					};
					error_exit(msg, code)
				}
			};
			let level = match clap_matches.get_one::<String>("level") {
				Some(raw) => match raw.parse::<u32>() {
					Ok(n) => n,
					Err(_) => error_exit("Non-numeric value for level", 2)
				},
				None => tree.height() - 1
			};
			let rendered = tree.render(level, clap_matches.get_flag("divisions"));
			log::info!(
				"rendered a {}-level tree at level {} into {}x{} pixels",
				tree.height(),
				level,
				tree.image_width(),
				tree.image_height()
			);
			let output_path = match clap_matches.get_one::<String>("OUTPUT") {
				Some(p) => p.clone(),
				None => swap_extension(input_path, "png")
			};
			match rendered.save(&output_path) {
				Ok(_) => (),
				Err(_) => error_exit("Could not save output", 3)
			}
		},
		(false, false) => error_exit("One of -i/--into and -f/--from must be present", 2)
	}
}
