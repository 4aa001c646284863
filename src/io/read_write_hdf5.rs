//! `Hdf5` functions to read and write ndarrays and scalars
use crate::error::{Error, Result};
use hdf5::H5Type;
use ndarray::{Array, Array1, ArrayBase, ArrayD, Dimension};
use std::path::Path;

/// Open `filename` for appending, create it if missing
///
/// # Errors
/// File cannot be opened or created.
pub fn open_or_create<P: AsRef<Path>>(filename: P) -> hdf5::Result<hdf5::File> {
    if filename.as_ref().exists() {
        hdf5::File::append(filename)
    } else {
        hdf5::File::create(filename)
    }
}

/// Read scalar from hdf5
///
/// # Errors
/// File or variable does not exist, or the variable holds more than one
/// value.
pub fn read_scalar_from_hdf5<T, P>(filename: P, name: &str) -> Result<T>
where
    T: H5Type + Copy,
    P: AsRef<Path>,
{
    let scalar: Array1<T> = read_from_hdf5(filename, name)?;
    if scalar.len() != 1 {
        return Err(Error::config(format!(
            "{} holds {} values, expected a scalar",
            name,
            scalar.len()
        )));
    }
    Ok(scalar[0])
}

/// Write scalar to hdf5 file
///
/// # Errors
/// File cannot be written.
pub fn write_scalar_to_hdf5<T, P>(filename: P, name: &str, scalar: T) -> Result<()>
where
    T: H5Type + Copy,
    P: AsRef<Path>,
{
    let x = Array1::<T>::from_elem(1, scalar);
    write_to_hdf5(filename, name, &x)
}

/// Read ndarray from hdf5 file
///
/// # Errors
/// File or variable does not exist, or the variable has a different
/// dimensionality than `D`.
pub fn read_from_hdf5<A, D, P>(filename: P, varname: &str) -> Result<Array<A, D>>
where
    A: H5Type,
    D: Dimension,
    P: AsRef<Path>,
{
    let file = hdf5::File::open(filename)?;
    let data = file.dataset(varname)?;
    let y: ArrayD<A> = data.read_dyn::<A>()?;
    y.into_dimensionality::<D>()
        .map_err(|e| Error::config(format!("{}: {}", varname, e)))
}

/// Write ndarray to hdf5 file
///
/// An existing variable is overwritten in place and must have the same
/// shape as `array`.
///
/// # Errors
/// File cannot be written, or the variable exists with another shape.
pub fn write_to_hdf5<A, S, D, P>(filename: P, varname: &str, array: &ArrayBase<S, D>) -> Result<()>
where
    A: H5Type,
    S: ndarray::Data<Elem = A>,
    D: Dimension,
    P: AsRef<Path>,
{
    let file = open_or_create(filename)?;
    let dset = match file.dataset(varname) {
        Ok(dset) => dset,
        Err(..) => file
            .new_dataset::<A>()
            .no_chunk()
            .shape(array.shape())
            .create(varname)?,
    };
    dset.write(&array.view())?;
    Ok(())
}
