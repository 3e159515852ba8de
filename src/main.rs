use anyhow::Result;
use beamlink::geom::Scene;
use beamlink::interference::InterferenceRun;
use beamlink::output::{self, SweepWriter};
use beamlink::settings;
use beamlink::shapes::{BoxOverlap, EnvelopeBeamModel};
use beamlink::sweep::HeightSweep;

fn main() -> Result<()> {
    let settings = settings::load_config()?;
    let mut scene = Scene::from_file(&settings.scene_name)?;

    let mut writer = SweepWriter::new(
        &settings.directory,
        scene.transceivers.iter().map(|t| t.name.clone()).collect(),
        scene.assembly.reflectors.iter().map(|r| r.name.clone()).collect(),
    )?;

    let report = {
        let mut sweep = HeightSweep::new(&scene.transceivers, &mut scene.assembly, &settings)?;
        sweep.run(&mut writer)?
    };
    output::write_height_summary(&report.summaries, &settings.directory)?;
    for summary in &report.summaries {
        println!("{}", summary);
    }

    let mut run = InterferenceRun::new(&mut scene, &settings, EnvelopeBeamModel::default(), BoxOverlap);
    run.run()?;
    output::write_interference(&run.report, settings.top_k, &settings.directory)?;
    println!(
        "Interference: {}/{} links ({:.2}%)",
        run.report.interfered_links,
        run.report.total_links,
        100.0 * run.report.ratio()
    );

    Ok(())
}
