use observe_array_splice::{
    apply_splices, calc_splices, calculate_splices, merge_splice, project_splices, Splice,
};

fn replay(old: &[i32], new: &[i32]) -> Vec<i32> {
    let splices = calculate_splices(new, old);
    let mut copy = old.to_vec();
    apply_splices(&mut copy, new, &splices);
    copy
}

#[test]
fn calculate_splices_matrix() {
    let cases: Vec<(Vec<i32>, Vec<i32>, Vec<Splice<i32>>)> = vec![
        (vec![], vec![], vec![]),
        (vec![1, 2, 3], vec![1, 2, 3], vec![]),
        (vec![], vec![1, 2], vec![Splice::new(0, vec![], 2)]),
        (vec![1, 2], vec![], vec![Splice::new(0, vec![1, 2], 0)]),
        (vec![1, 2, 3], vec![0, 1, 2, 3], vec![Splice::new(0, vec![], 1)]),
        (vec![1, 2, 3], vec![1, 2, 3, 4], vec![Splice::new(3, vec![], 1)]),
        (vec![1, 2, 3, 4], vec![1, 5, 6, 4], vec![Splice::new(1, vec![2, 3], 2)]),
        (
            vec![1, 2, 3, 4, 5],
            vec![2, 3, 4],
            vec![Splice::new(0, vec![1], 0), Splice::new(3, vec![5], 0)],
        ),
        (
            vec![1, 2, 3],
            vec![3, 2, 1],
            vec![Splice::new(0, vec![1], 1), Splice::new(2, vec![3], 1)],
        ),
    ];

    for (old, new, expected) in cases {
        let splices = calculate_splices(&new, &old);
        assert_eq!(splices, expected, "old={old:?} new={new:?}");
        assert_eq!(replay(&old, &new), new);
    }
}

#[test]
fn substitution_prefers_untouched_runs() {
    // The shared element 2 is left in place; each side of it is its own
    // remove-one/add-one splice.
    let old = vec![1, 2, 3];
    let new = vec![7, 2, 8];
    let splices = calculate_splices(&new, &old);
    assert_eq!(
        splices,
        vec![Splice::new(0, vec![1], 1), Splice::new(2, vec![3], 1)]
    );
}

#[test]
fn range_splices_only_cover_requested_window() {
    let current = vec![9, 9, 1, 2, 9];
    let old = vec![1, 3];
    let splices = calc_splices(&current, 2, 4, &old, 0, 2);
    assert_eq!(splices, vec![Splice::new(3, vec![3], 1)]);
}

#[test]
fn merged_native_splices_replay_to_final_array() {
    let old = vec!['a', 'b', 'c', 'd', 'e'];
    let mut live = old.clone();
    let mut merged = Vec::new();

    // push('f')
    live.push('f');
    merge_splice(&mut merged, 5, vec![], 1);
    // splice(1, 2, 'x')
    let removed: Vec<char> = live.splice(1..3, ['x']).collect();
    merge_splice(&mut merged, 1, removed, 1);
    // shift()
    let first = live.remove(0);
    merge_splice(&mut merged, 0, vec![first], 0);
    // live[2] = 'e' (same value written back)
    let previous = std::mem::replace(&mut live[2], 'e');
    merge_splice(&mut merged, 2, vec![previous], 1);

    assert_eq!(live, vec!['x', 'd', 'e', 'f']);

    let splices = project_splices(&live, merged);
    let mut copy = old.clone();
    apply_splices(&mut copy, &live, &splices);
    assert_eq!(copy, live);
    assert_eq!(
        splices,
        vec![
            Splice::new(0, vec!['a', 'b', 'c'], 1),
            Splice::new(3, vec![], 1)
        ]
    );
}
