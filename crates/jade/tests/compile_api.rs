use std::rc::Rc;

use jade::source::DiskSource;
use jade::{
    compile, compile_dir, compile_file, Compiler, DiagnosticKind, DirOptions, JadeError,
    MemorySource, Options,
};

fn compact(source: MemorySource) -> Options {
    Options {
        pretty_print: false,
        source: Rc::new(source),
        ..Options::default()
    }
}

fn diagnostic(err: JadeError) -> jade::Diagnostic {
    match err {
        JadeError::Diagnostic(diagnostic) => diagnostic,
        other => panic!("expected a diagnostic, got {other}"),
    }
}

#[test]
fn compiles_text_without_a_file() {
    let options = compact(MemorySource::new());
    assert_eq!(
        compile("html\n\thead\n\t\ttitle\n\tbody\n\t\tdiv: p", &options).expect("compile"),
        "<html><head><title></title></head><body><div><p></p></div></body></html>\n"
    );
    assert_eq!(compile("", &options).expect("empty"), "");
}

#[test]
fn relative_targets_need_a_file_name() {
    let options = compact(MemorySource::new().with_file("nav.jade", "nav"));
    let err = diagnostic(compile("import nav", &options).expect_err("no file name"));
    assert_eq!(err.code, "E2008");

    let mut compiler = Compiler::new(options);
    compiler.set_filename("page.jade");
    compiler.parse("import nav\np").expect("parse");
    assert_eq!(compiler.compile_string().expect("compile"), "<nav></nav><p></p>\n");
}

#[test]
fn chained_extends_resolve_bottom_up() {
    let source = MemorySource::new()
        .with_file("base.jade", "html\n\tblock body\n\t\tp base")
        .with_file(
            "layouts/two-column.jade",
            "extends ../base\nblock body\n\tdiv.left\n\t\tblock left\n\tdiv.right\n\t\tblock right\n\t\t\tp right",
        )
        .with_file(
            "pages/home.jade",
            "extends ../layouts/two-column\nblock left\n\tp left\nblock prepend right\n\th2 Aside",
        );
    let output = compile_file("pages/home.jade", &compact(source)).expect("compile");
    assert_eq!(
        output,
        "<html><div class=\"left\"><p>left</p></div><div class=\"right\"><h2>Aside</h2><p>right</p></div></html>\n"
    );
}

#[test]
fn cycles_are_reported() {
    let source = MemorySource::new()
        .with_file("a.jade", "extends b")
        .with_file("b.jade", "extends a");
    let err = diagnostic(compile_file("a.jade", &compact(source)).expect_err("cycle"));
    assert_eq!(err.code, "E2007");
    assert_eq!(err.kind, DiagnosticKind::Semantic);
    assert!(err.message.contains("a.jade -> b.jade -> a.jade"), "{}", err.message);
}

#[test]
fn missing_files() {
    let options = compact(MemorySource::new().with_file("page.jade", "import missing"));
    assert!(matches!(
        compile_file("nope.jade", &options),
        Err(JadeError::Read { .. })
    ));
    let err = diagnostic(compile_file("page.jade", &options).expect_err("missing import"));
    assert_eq!(err.code, "E4001");
    assert_eq!(err.kind, DiagnosticKind::Resolution);
    assert_eq!(err.position.filename, "page.jade");
}

#[test]
fn errors_render_with_their_position() {
    let options = compact(MemorySource::new().with_file("page.jade", "div\n\tp\n  span"));
    let err = compile_file("page.jade", &options).expect_err("bad indentation");
    let rendered = err.to_string();
    assert!(rendered.starts_with("error[E1002] page.jade:3:"), "{rendered}");
}

#[test]
fn compiler_keeps_the_parsed_tree() {
    let mut compiler = Compiler::new(compact(MemorySource::new()));
    compiler.parse("p= Name").expect("parse");
    assert_eq!(compiler.ast().children.len(), 1);

    let mut out = Vec::new();
    compiler.compile_writer(&mut out).expect("write");
    assert_eq!(String::from_utf8(out).expect("utf8"), "<p>{{.Name}}</p>\n");
    assert_eq!(
        compiler.compile_string().expect("again"),
        "<p>{{.Name}}</p>\n"
    );
}

#[test]
fn compiles_directories_from_memory() {
    let source = MemorySource::new()
        .with_file("views/index.jade", "p index")
        .with_file("views/layouts/base.jade", "html")
        .with_file("views/notes.txt", "ignored")
        .with_file("other/x.jade", "p");
    let options = compact(source);

    let compiled = compile_dir("views", &DirOptions::default(), &options).expect("compile dir");
    let names: Vec<&str> = compiled.keys().map(String::as_str).collect();
    assert_eq!(names, ["index", "layouts/base"]);
    assert_eq!(compiled["index"].body, "<p>index</p>\n");
    assert_eq!(compiled["layouts/base"].path, "views/layouts/base.jade");

    let flat = DirOptions {
        recursive: false,
        ..DirOptions::default()
    };
    let compiled = compile_dir("views", &flat, &options).expect("flat");
    assert_eq!(compiled.len(), 1);

    assert!(matches!(
        compile_dir("missing", &DirOptions::default(), &options),
        Err(JadeError::InvalidPath { .. })
    ));
}

#[test]
fn compiles_directories_from_disk() {
    let dir = tempfile::tempdir().expect("tempdir");
    std::fs::create_dir_all(dir.path().join("templates/compiledir_test")).expect("mkdir");
    std::fs::write(dir.path().join("templates/basic.jade"), "p basic").expect("write");
    std::fs::write(
        dir.path().join("templates/compiledir_test/basic.jade"),
        "extends ../layout\nblock main\n\tp nested",
    )
    .expect("write");
    std::fs::write(dir.path().join("templates/layout.jade"), "main\n\tblock main").expect("write");

    let options = Options {
        pretty_print: false,
        source: Rc::new(DiskSource::new(dir.path())),
        ..Options::default()
    };
    let compiled = compile_dir("templates", &DirOptions::default(), &options).expect("compile");
    let names: Vec<&str> = compiled.keys().map(String::as_str).collect();
    assert_eq!(names, ["basic", "compiledir_test/basic", "layout"]);
    assert_eq!(
        compiled["compiledir_test/basic"].body,
        "<main><p>nested</p></main>\n"
    );

    let json = serde_json::to_value(&compiled["basic"]).expect("json");
    assert_eq!(json["name"], "basic");
}
