use mpwmerge::config::CheckConfig;
use mpwmerge::layout::cell::{Cell, Instance};
use mpwmerge::layout::layers::LayerSpec;
use mpwmerge::layout::Layout;
use mpwmerge::verify::{check_file, write_results, CheckError};
use subgeom::Point;

mod common;
use common::{rect, WAVEGUIDE};

const MARKER: LayerSpec = LayerSpec::new(998, 0);

fn submission(gc_name: &str) -> Layout {
    let mut layout = Layout::new("lib", 0.001);
    let mut gc = Cell::new(gc_name);
    gc.draw_rect(MARKER, rect(-20_000, -10_000, 0, 10_000));
    gc.draw_rect(WAVEGUIDE, rect(-20_000, -250, 0, 250));
    let gc = layout.add_cell(gc);
    let mut top = Cell::new("EBeam_alice_MZI");
    top.add_inst(Instance::at(gc, Point::new(40_000, 15_000)));
    top.draw_rect(WAVEGUIDE, rect(40_000, 14_750, 200_000, 15_250));
    layout.add_cell(top);
    layout
}

#[test]
fn known_black_box_passes() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("EBeam_alice_MZI.gds");
    submission("ebeam_gc_te1550").to_gds(&path).unwrap();

    let output = check_file(&path, &CheckConfig::default());
    assert_eq!(output.num_errors(), 0);
    assert_eq!(output.data().replaced(), 1);

    let rdb = write_results(&path, &output).unwrap();
    assert_eq!(rdb, dir.path().join("EBeam_alice_MZI.lyrdb"));
    let xml = std::fs::read_to_string(rdb).unwrap();
    assert!(!xml.contains("<item>"));
}

#[test]
fn renamed_black_box_fails() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("EBeam_alice_MZI.gds");
    submission("ebeam_gc_te1550_modified").to_gds(&path).unwrap();

    let output = check_file(&path, &CheckConfig::default());
    assert_eq!(output.num_errors(), 1);
    assert_eq!(
        output.errors()[0],
        CheckError::BlackBox {
            cell: arcstr::literal!("ebeam_gc_te1550_modified")
        }
    );
}

#[test]
fn pdk_layers_are_checked() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("EBeam_alice_MZI.gds");
    submission("ebeam_gc_te1550").to_gds(&path).unwrap();
    let lyp = dir.path().join("EBeam.lyp");
    std::fs::write(
        &lyp,
        "<layer-properties><properties><source>998/0@1</source></properties></layer-properties>",
    )
    .unwrap();
    let config = CheckConfig::builder().layer_table(lyp).build().unwrap();

    let output = check_file(&path, &config);
    assert_eq!(
        output.errors(),
        &[CheckError::UndeclaredLayer(WAVEGUIDE)]
    );
}
