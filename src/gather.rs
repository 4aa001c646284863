//! Distribution of the initial field and collection of the result
//!
//! Both directions move one row of a sub-grid per message. Messages from
//! the same source with the same tag arrive in order, so every row lands
//! at the right place.
use crate::comm::{Communicator, Tag};
use crate::domain::LocalDomain;
use crate::error::{Error, Result};
use crate::grid::GlobalGrid;
use crate::partition::Partition;
use ndarray::{s, ArrayView1};

/// Send every rank its block of `global` and copy the own block into `u`
///
/// `global` is only read on rank 0, other ranks pass `None`.
///
/// # Errors
/// Rank 0 passes no grid or a grid whose shape differs from the partition,
/// or a communication failed.
pub fn scatter_initial<C: Communicator>(
    comm: &C,
    partition: &Partition,
    global: Option<&GlobalGrid>,
    domain: &mut LocalDomain,
    tag: Tag,
) -> Result<()> {
    if comm.rank() != 0 {
        let mut row = vec![0.; domain.width()];
        for i in 0..domain.height() {
            comm.receive_into(0, tag, &mut row)?;
            domain.u.row_mut(i).assign(&ArrayView1::from(&row[..]));
        }
        log::debug!("[{}]: initial block received", comm.rank());
        return Ok(());
    }
    let global = check_root_grid(partition, global)?;
    for rank in 1..comm.size() {
        let r = partition.range(rank);
        for y in r.y0..r.y1 {
            let row = global.data.slice(s![y, r.x0..r.x1]).to_vec();
            comm.send(rank, tag, &row)?;
        }
    }
    let r = partition.range(0);
    domain
        .u
        .assign(&global.data.slice(s![r.y0..r.y1, r.x0..r.x1]));
    Ok(())
}

/// Collect `u` of every rank into `global` on rank 0
///
/// Rank 0 receives from ranks `1..n` in order; other ranks pass `None`.
///
/// # Errors
/// Rank 0 passes no grid or a grid whose shape differs from the partition,
/// or a communication failed.
pub fn gather<C: Communicator>(
    comm: &C,
    partition: &Partition,
    domain: &LocalDomain,
    global: Option<&mut GlobalGrid>,
    tag: Tag,
) -> Result<()> {
    if comm.rank() != 0 {
        for row in domain.u.rows() {
            comm.send(0, tag, &row.to_vec())?;
        }
        return Ok(());
    }
    let global = match global {
        Some(g) => g,
        None => return Err(Error::config("rank 0 needs a global grid")),
    };
    check_root_grid(partition, Some(&*global))?;
    for rank in 1..comm.size() {
        let r = partition.range(rank);
        let mut row = vec![0.; r.width()];
        for y in r.y0..r.y1 {
            comm.receive_into(rank, tag, &mut row)?;
            global
                .data
                .slice_mut(s![y, r.x0..r.x1])
                .assign(&ArrayView1::from(&row[..]));
        }
        log::trace!("[0]: block of rank {} gathered", rank);
    }
    let r = partition.range(0);
    global
        .data
        .slice_mut(s![r.y0..r.y1, r.x0..r.x1])
        .assign(&domain.u);
    Ok(())
}

fn check_root_grid<'a>(
    partition: &Partition,
    global: Option<&'a GlobalGrid>,
) -> Result<&'a GlobalGrid> {
    let global = global.ok_or_else(|| Error::config("rank 0 needs a global grid"))?;
    if global.width() != partition.width || global.height() != partition.height {
        return Err(Error::config(format!(
            "global grid is {}x{}, partition expects {}x{}",
            global.width(),
            global.height(),
            partition.width,
            partition.height
        )));
    }
    Ok(global)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::ThreadUniverse;
    use crate::partition::ProcessGrid;

    fn numbered(width: usize, height: usize) -> GlobalGrid {
        GlobalGrid::from_vec(width, height, (0..width * height).map(|v| v as f64).collect())
            .unwrap()
    }

    #[test]
    fn test_scatter_then_gather_restores_grid() {
        let part = Partition::new(7, 5, ProcessGrid::new(2, 3)).unwrap();
        let input = numbered(7, 5);
        let universe = ThreadUniverse::new(6);
        let results = universe.run(|comm| -> Result<Option<GlobalGrid>> {
            let root = comm.rank() == 0;
            let mut d = LocalDomain::new(&part, comm.rank());
            scatter_initial(&comm, &part, root.then_some(&input), &mut d, 1)?;
            // every cell holds its global index
            for i in 1..=d.height() {
                for j in 1..=d.width() {
                    let (x, y) = d.global_index(i, j);
                    assert_eq!(d.u_at(i, j), (x + 7 * y) as f64);
                }
            }
            let mut output = root.then(|| GlobalGrid::zeros(7, 5));
            gather(&comm, &part, &d, output.as_mut(), 2)?;
            Ok(output)
        });
        let gathered = results[0].as_ref().unwrap().as_ref().unwrap();
        assert_eq!(gathered, &input);
        assert!(results[1].as_ref().unwrap().is_none());
    }

    #[test]
    fn test_root_needs_matching_grid() {
        let part = Partition::new(4, 4, ProcessGrid::new(1, 1)).unwrap();
        let universe = ThreadUniverse::new(1);
        let comm = universe.communicator(0);
        let mut d = LocalDomain::new(&part, 0);
        assert!(scatter_initial(&comm, &part, None, &mut d, 1).is_err());
        let wrong = GlobalGrid::zeros(3, 4);
        assert!(scatter_initial(&comm, &part, Some(&wrong), &mut d, 1).is_err());
        let mut wrong = GlobalGrid::zeros(4, 5);
        assert!(gather(&comm, &part, &d, Some(&mut wrong), 1).is_err());
    }
}
