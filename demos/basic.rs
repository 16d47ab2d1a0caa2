use bitfilter::*;

fn main() -> Result<(), BitfilterError> {
    // 1. Configure the matcher
    let matcher = Matcher::new(MatcherOptions::builder().allow_legacy_operators(true).build());

    // 2. A small collection: integer flags, a negative value and a binary blob
    let docs = vec![
        doc! { "name" => "alpha", "flags" => 54 },
        doc! { "name" => "beta", "flags" => 255 },
        doc! { "name" => "gamma", "flags" => -54 },
        doc! { "name" => "delta", "flags" => Binary::new(vec![0x36, 0x00, 0x01]) },
        doc! { "name" => "epsilon", "flags" => "not a number" },
    ];

    // 3. Parse and compile a query
    let query = doc! { "flags" => doc! { "$bitsAllSet" => vec![1, 2, 4, 5], "$bitsAnyClear" => 1 } };
    let filter = matcher.compile(&query)?;
    println!("Filter: {}", filter.expr());
    println!("Residual filter required: {}", filter.requires_residual_filter());

    // 4. Scan the collection
    for doc in filter.scan(&docs) {
        println!("Match: {}", doc);
    }
    println!("Matches: {}", filter.count_matches(&docs));

    // 5. Explain
    println!("Explain: {:#?}", filter.explain());

    // 6. Invalid operands are rejected at compile time
    if let Err(e) = matcher.compile(&doc! { "flags" => doc! { "$bitsAnySet" => vec![-1] } }) {
        println!("Rejected: {}", e);
    }
    Ok(())
}
