#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use sprig_core::{Element, VTree};
use sprig_web::{MemoryDocument, Renderer};

const MAX_DEPTH: usize = 4;
const MAX_CHILDREN: usize = 6;
const TAGS: [&str; 3] = ["div", "span", "li"];

#[derive(Debug, Arbitrary)]
enum Shape {
    Text(u8),
    Element {
        tag: u8,
        key: Option<u8>,
        id: Option<u8>,
        class: Option<u8>,
        children: Vec<Shape>,
    },
}

fn build(shape: &Shape, depth: usize) -> VTree {
    match shape {
        Shape::Text(n) => VTree::text(format!("t{}", n % 4)),
        Shape::Element {
            tag,
            key,
            id,
            class,
            children,
        } => {
            let mut builder = Element::build(TAGS[usize::from(*tag) % TAGS.len()]);
            if let Some(key) = key {
                builder = builder.key(format!("k{}", key % 4));
            }
            if let Some(id) = id {
                builder = builder.id(format!("i{}", id % 4));
            }
            if let Some(class) = class {
                builder = builder.class(format!("c{}", class % 3));
            }
            if depth < MAX_DEPTH {
                builder = builder.children(
                    children
                        .iter()
                        .take(MAX_CHILDREN)
                        .map(|child| build(child, depth + 1)),
                );
            }
            builder.finish()
        }
    }
}

fn wrap(shape: &Shape) -> VTree {
    Element::build("main").child(build(shape, 0)).finish()
}

fuzz_target!(|input: (Shape, Shape)| {
    let (old, new) = (wrap(&input.0), wrap(&input.1));

    let mut patched = MemoryDocument::new();
    let root = patched.root();
    let mut renderer = Renderer::new();
    if renderer.mount(&mut patched, root, &old).is_err() {
        return;
    }
    renderer
        .patch(&mut patched, root, Some(&old), Some(&new), 0)
        .expect("patch of a mounted tree");

    let mut fresh = MemoryDocument::new();
    let fresh_root = fresh.root();
    Renderer::new()
        .mount(&mut fresh, fresh_root, &new)
        .expect("mount");

    assert_eq!(patched.inner_html(root), fresh.inner_html(fresh_root));
    assert_eq!(patched.live_nodes(), fresh.live_nodes());
});
