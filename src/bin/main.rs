fn main() {
    xelproxy::main();
}
