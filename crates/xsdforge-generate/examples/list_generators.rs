use xsdforge_generate::generators::GeneratorRegistry;

fn main() {
    let registry = GeneratorRegistry::default();
    for id in registry.ids() {
        println!("{id}");
    }
}
