use predicate_index::{Predicate, PredicateIndex, PredicateIndexBuilder, PredicateQuery};

fn main() {
    let mut builder = PredicateIndexBuilder::new(8).unwrap();
    builder
        .index_document(
            1,
            &Predicate::and([
                Predicate::feature_set("country", ["no", "se"]),
                Predicate::feature_set("gender", ["male"]),
            ]),
        )
        .unwrap();
    builder
        .index_document(
            2,
            &Predicate::and([
                Predicate::feature_range("age", Some(20), Some(40)),
                Predicate::feature_not_in("segment", [13, 14]),
            ]),
        )
        .unwrap();
    builder.index_document(3, &Predicate::True).unwrap();
    let index = builder.build();

    let mut bytes = vec![];
    index.write_to(&mut bytes).unwrap();
    let index = PredicateIndex::read_from(bytes.as_slice()).unwrap();

    let mut query = PredicateQuery::new();
    query
        .add_feature("country", "no")
        .add_feature_with_subqueries("gender", "male", 0b01)
        .add_feature_with_subqueries("gender", "female", 0b10)
        .add_feature("segment", 2)
        .add_range_feature("age", 36);

    for hit in index.searcher().search(&query) {
        println!("{hit}");
    }
}
